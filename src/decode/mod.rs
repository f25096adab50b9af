//! Row decoding: matching result columns to an entity's construction
//! strategy, and caching the match as a [`DecodePlan`].

pub mod scalar;

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::coltype::ColumnResolution;
use crate::driver::RowReader;
use crate::error::MapperResult;
use crate::handlers::HandlerRegistry;
use crate::ident::snake_to_pascal;
use crate::reflect::{self, ConstructionStrategy, MappedEntity};

/// A compiled match between one query's result columns and one entity
/// type's construction strategy. Stamped with the handler registry
/// version in effect when it was built; [`PlanCache`] rebuilds once
/// that version moves on.
pub struct DecodePlan<E> {
    strategy: Arc<ConstructionStrategy<E>>,
    param_ordinals: Vec<Option<usize>>,
    param_resolutions: Vec<ColumnResolution>,
    field_ordinals: Vec<Option<usize>>,
    field_resolutions: Vec<ColumnResolution>,
}

fn match_ordinal(columns: &[String], name: &str) -> Option<usize> {
    if let Some(idx) = columns.iter().position(|c| c.eq_ignore_ascii_case(name)) {
        return Some(idx);
    }
    columns.iter().position(|c| snake_to_pascal(c) == name)
}

fn build_plan<E: MappedEntity>(
    columns: &[String],
    strategy: Arc<ConstructionStrategy<E>>,
    registry: &HandlerRegistry,
) -> DecodePlan<E> {
    let mut consumed = vec![false; columns.len()];
    let mut param_ordinals = Vec::with_capacity(strategy.ctor_params.len());
    let mut param_resolutions = Vec::with_capacity(strategy.ctor_params.len());

    if strategy.has_parameterised_ctor() {
        for param in &strategy.ctor_params {
            let ordinal = match_ordinal(columns, param.name);
            if let Some(idx) = ordinal {
                consumed[idx] = true;
            }
            param_ordinals.push(ordinal);
            param_resolutions.push(param.resolve(registry));
        }
    }

    let mut field_ordinals = Vec::with_capacity(strategy.settable_fields.len());
    let mut field_resolutions = Vec::with_capacity(strategy.settable_fields.len());
    for field in &strategy.settable_fields {
        let ordinal = match_ordinal(columns, field.name).filter(|&idx| !consumed[idx]);
        field_ordinals.push(ordinal);
        field_resolutions.push(field.resolve(registry));
    }

    DecodePlan {
        strategy,
        param_ordinals,
        param_resolutions,
        field_ordinals,
        field_resolutions,
    }
}

/// Builds one instance of `E` from the reader's current row, following
/// `plan`: a parameterised constructor is preferred when
/// the entity has one, with any of its arguments absent from the result
/// set defaulted rather than erroring; any settable fields left over
/// (not consumed as constructor arguments) are then applied from their
/// matching columns, a null column leaving the field at whatever the
/// constructor produced.
pub fn materialize_row<E: MappedEntity>(plan: &DecodePlan<E>, reader: &dyn RowReader) -> MapperResult<E> {
    let mut entity = if plan.strategy.has_parameterised_ctor() {
        let mut args = Vec::with_capacity(plan.param_ordinals.len());
        for (i, ordinal) in plan.param_ordinals.iter().enumerate() {
            let param = &plan.strategy.ctor_params[i];
            let bound = ordinal.map(|o| (reader, o, &plan.param_resolutions[i]));
            args.push(param.read_or_default(bound)?);
        }
        plan.strategy.construct_parameterised(args)?
    } else {
        plan.strategy.construct_nullary()?
    };

    for (i, ordinal) in plan.field_ordinals.iter().enumerate() {
        if let Some(ordinal) = ordinal {
            if reader.is_null(*ordinal) {
                continue;
            }
            let field = &plan.strategy.settable_fields[i];
            field.apply(&mut entity, reader, *ordinal, &plan.field_resolutions[i])?;
        }
    }

    Ok(entity)
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct PlanKey {
    entity: TypeId,
    columns: Vec<String>,
    registry_version: u64,
}

/// Process-wide cache of decode plans, keyed by entity type, the exact
/// tuple of result column names, and the handler registry version in
/// effect — any of the three changing means a different plan applies.
pub struct PlanCache {
    plans: DashMap<PlanKey, Arc<dyn Any + Send + Sync>>,
}

impl PlanCache {
    fn new() -> Self {
        Self { plans: DashMap::new() }
    }

    pub fn get_or_build<E: MappedEntity>(
        &self,
        columns: &[String],
        registry: &HandlerRegistry,
    ) -> Arc<DecodePlan<E>> {
        let key = PlanKey {
            entity: TypeId::of::<E>(),
            columns: columns.to_vec(),
            registry_version: registry.version(),
        };
        if let Some(existing) = self.plans.get(&key) {
            if let Ok(plan) = existing.clone().downcast::<DecodePlan<E>>() {
                log::debug!(
                    "using cached decode plan for {} ({} columns)",
                    std::any::type_name::<E>(),
                    columns.len()
                );
                return plan;
            }
        }
        log::info!(
            "building decode plan for {} ({} columns)",
            std::any::type_name::<E>(),
            columns.len()
        );
        let strategy = reflect::global().get_or_build::<E>();
        let built = Arc::new(build_plan(columns, strategy, registry));
        self.plans.insert(key, built.clone());
        built
    }

    pub fn clear(&self) {
        self.plans.clear();
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_PLAN_CACHE: Lazy<PlanCache> = Lazy::new(PlanCache::new);

pub fn global() -> &'static PlanCache {
    &GLOBAL_PLAN_CACHE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DbTypeHint, DbValue};
    use crate::reflect::{ConstructionStrategyBuilder, SettableField};

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        name: String,
        age: i32,
    }

    impl MappedEntity for Person {
        fn build_construction_strategy() -> ConstructionStrategy<Self> {
            ConstructionStrategyBuilder::new()
                .nullary(Person::default)
                .field(SettableField::new("Name", |e: &mut Person, v: String| {
                    e.name = v
                }))
                .field(SettableField::new("Age", |e: &mut Person, v: i32| e.age = v))
                .build()
        }
    }

    struct FakeRow {
        names: Vec<String>,
        values: Vec<DbValue>,
    }

    #[async_trait::async_trait]
    impl RowReader for FakeRow {
        fn field_count(&self) -> usize {
            self.names.len()
        }
        fn name(&self, index: usize) -> &str {
            &self.names[index]
        }
        fn is_null(&self, index: usize) -> bool {
            self.values[index].is_null()
        }
        fn get_value(&self, index: usize) -> DbValue {
            self.values[index].clone()
        }
        fn get_typed(&self, index: usize, _hint: DbTypeHint) -> MapperResult<DbValue> {
            Ok(self.values[index].clone())
        }
        async fn read(&mut self) -> MapperResult<bool> {
            Ok(false)
        }
        async fn next_result(&mut self) -> MapperResult<bool> {
            Ok(false)
        }
        fn has_rows(&self) -> bool {
            true
        }
    }

    #[test]
    fn snake_case_columns_match_pascal_field_names() {
        let registry = HandlerRegistry::new();
        let columns = vec!["name".to_string(), "age".to_string()];
        let strategy = Arc::new(Person::build_construction_strategy());
        let plan = build_plan(&columns, strategy, &registry);
        let row = FakeRow {
            names: columns.clone(),
            values: vec![DbValue::Str("Ada".to_string()), DbValue::I32(41)],
        };
        let person = materialize_row(&plan, &row).unwrap();
        assert_eq!(person, Person { name: "Ada".to_string(), age: 41 });
    }

    #[test]
    fn null_column_leaves_constructor_default() {
        let registry = HandlerRegistry::new();
        let columns = vec!["name".to_string(), "age".to_string()];
        let strategy = Arc::new(Person::build_construction_strategy());
        let plan = build_plan(&columns, strategy, &registry);
        let row = FakeRow {
            names: columns.clone(),
            values: vec![DbValue::Null, DbValue::I32(9)],
        };
        let person = materialize_row(&plan, &row).unwrap();
        assert_eq!(person, Person { name: String::new(), age: 9 });
    }
}
