//! Construction strategy cache.
//!
//! Rust has no runtime reflection, so "inspect the type once, cache a
//! compiled plan for constructing and populating it" is expressed as a
//! trait an entity implements once — [`MappedEntity`] —
//! rather than something discovered by walking fields at runtime. The
//! cache still exists and still serves the same purpose: building a
//! [`ConstructionStrategy`] allocates a handful of boxed closures per
//! field, and a query executed in a hot loop should pay that cost once
//! per entity type, not once per row.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::coltype::{read_value, resolve_column_kind, ColumnResolution, ColumnType};
use crate::driver::RowReader;
use crate::error::MapperResult;
use crate::handlers::HandlerRegistry;

/// One settable field of an entity: a name (used for the column-name
/// match) plus a compiled, type-erased "read this column and set it on
/// the instance" step.
pub struct SettableField<E> {
    pub name: &'static str,
    resolve: fn(&HandlerRegistry) -> ColumnResolution,
    apply: Box<dyn Fn(&mut E, &dyn RowReader, usize, &ColumnResolution) -> MapperResult<()> + Send + Sync>,
}

impl<E: 'static> SettableField<E> {
    /// `setter` assigns a decoded `T` onto the instance, e.g.
    /// `|e, v| e.name = v`.
    pub fn new<T>(name: &'static str, setter: impl Fn(&mut E, T) + Send + Sync + 'static) -> Self
    where
        T: ColumnType,
    {
        Self {
            name,
            resolve: resolve_column_kind::<T>,
            apply: Box::new(move |entity, reader, ordinal, resolution| {
                let value = read_value::<T>(reader, ordinal, resolution)?;
                setter(entity, value);
                Ok(())
            }),
        }
    }

    pub fn resolve(&self, registry: &HandlerRegistry) -> ColumnResolution {
        (self.resolve)(registry)
    }

    pub fn apply(
        &self,
        entity: &mut E,
        reader: &dyn RowReader,
        ordinal: usize,
        resolution: &ColumnResolution,
    ) -> MapperResult<()> {
        (self.apply)(entity, reader, ordinal, resolution)
    }
}

/// One positional constructor parameter: a name (matched against result
/// columns exactly like a settable field), a compiled "read this column
/// or use the type's default" step, and a way to fold the produced value
/// into the boxed argument list the parameterised factory expects.
pub struct CtorParamDescriptor<E> {
    pub name: &'static str,
    resolve: fn(&HandlerRegistry) -> ColumnResolution,
    read_or_default: Box<
        dyn Fn(Option<(&dyn RowReader, usize, &ColumnResolution)>) -> MapperResult<Box<dyn Any + Send>>
            + Send
            + Sync,
    >,
    _marker: std::marker::PhantomData<fn() -> E>,
}

impl<E: 'static> CtorParamDescriptor<E> {
    pub fn new<T>(name: &'static str) -> Self
    where
        T: ColumnType + Default,
    {
        Self {
            name,
            resolve: resolve_column_kind::<T>,
            read_or_default: Box::new(move |bound| -> MapperResult<Box<dyn Any + Send>> {
                match bound {
                    Some((reader, ordinal, resolution)) if !reader.is_null(ordinal) => {
                        let value = read_value::<T>(reader, ordinal, resolution)?;
                        Ok(Box::new(value))
                    }
                    Some(_) => Ok(Box::new(T::default())),
                    None => {
                        log::debug!("constructor parameter `{name}` has no matching column, using its default");
                        Ok(Box::new(T::default()))
                    }
                }
            }),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn resolve(&self, registry: &HandlerRegistry) -> ColumnResolution {
        (self.resolve)(registry)
    }

    /// `bound` is `None` when the result set has no column matching this
    /// parameter's name: an unmatched constructor parameter is fed its
    /// type's default, not an error.
    pub fn read_or_default(
        &self,
        bound: Option<(&dyn RowReader, usize, &ColumnResolution)>,
    ) -> MapperResult<Box<dyn Any + Send>> {
        (self.read_or_default)(bound)
    }
}

/// The compiled plan for turning a result row into an instance of `E`.
pub struct ConstructionStrategy<E> {
    pub settable_fields: Vec<SettableField<E>>,
    pub ctor_params: Vec<CtorParamDescriptor<E>>,
    nullary_factory: Option<Box<dyn Fn() -> E + Send + Sync>>,
    parameterised_factory: Option<Box<dyn Fn(Vec<Box<dyn Any + Send>>) -> MapperResult<E> + Send + Sync>>,
}

impl<E: 'static> ConstructionStrategy<E> {
    pub fn has_nullary_ctor(&self) -> bool {
        self.nullary_factory.is_some()
    }

    pub fn has_parameterised_ctor(&self) -> bool {
        self.parameterised_factory.is_some()
    }

    pub fn construct_nullary(&self) -> MapperResult<E> {
        let factory = self.nullary_factory.as_ref().ok_or_else(|| {
            crate::error::MapperError::invalid_entity(
                std::any::type_name::<E>(),
                "no nullary constructor registered",
            )
        })?;
        Ok(factory())
    }

    pub fn construct_parameterised(&self, args: Vec<Box<dyn Any + Send>>) -> MapperResult<E> {
        let factory = self.parameterised_factory.as_ref().ok_or_else(|| {
            crate::error::MapperError::invalid_entity(
                std::any::type_name::<E>(),
                "no parameterised constructor registered",
            )
        })?;
        factory(args)
    }
}

/// Builder used by [`MappedEntity::build_construction_strategy`]
/// implementations to assemble a [`ConstructionStrategy`] without
/// exposing its private fields.
pub struct ConstructionStrategyBuilder<E> {
    settable_fields: Vec<SettableField<E>>,
    ctor_params: Vec<CtorParamDescriptor<E>>,
    nullary_factory: Option<Box<dyn Fn() -> E + Send + Sync>>,
    parameterised_factory: Option<Box<dyn Fn(Vec<Box<dyn Any + Send>>) -> MapperResult<E> + Send + Sync>>,
}

impl<E: 'static> ConstructionStrategyBuilder<E> {
    pub fn new() -> Self {
        Self {
            settable_fields: Vec::new(),
            ctor_params: Vec::new(),
            nullary_factory: None,
            parameterised_factory: None,
        }
    }

    pub fn nullary(mut self, factory: impl Fn() -> E + Send + Sync + 'static) -> Self {
        self.nullary_factory = Some(Box::new(factory));
        self
    }

    pub fn field(mut self, field: SettableField<E>) -> Self {
        self.settable_fields.push(field);
        self
    }

    pub fn parameterised(
        mut self,
        params: Vec<CtorParamDescriptor<E>>,
        factory: impl Fn(Vec<Box<dyn Any + Send>>) -> MapperResult<E> + Send + Sync + 'static,
    ) -> Self {
        self.ctor_params = params;
        self.parameterised_factory = Some(Box::new(factory));
        self
    }

    pub fn build(self) -> ConstructionStrategy<E> {
        ConstructionStrategy {
            settable_fields: self.settable_fields,
            ctor_params: self.ctor_params,
            nullary_factory: self.nullary_factory,
            parameterised_factory: self.parameterised_factory,
        }
    }
}

impl<E: 'static> Default for ConstructionStrategyBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Implemented once per entity type, by hand or by a derive macro a
/// consumer of this crate is free to write. The mapper inspects the
/// type once and caches what it learns.
pub trait MappedEntity: Sized + Send + 'static {
    fn build_construction_strategy() -> ConstructionStrategy<Self>;
}

/// Process-wide cache of compiled construction strategies, keyed by
/// entity type. Mirrors [`crate::handlers::HandlerRegistry`]'s pattern:
/// a `DashMap` because strategy lookup happens on every decoded row,
/// not just at startup.
pub struct StrategyCache {
    strategies: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl StrategyCache {
    fn new() -> Self {
        Self {
            strategies: DashMap::new(),
        }
    }

    /// Returns the cached strategy for `E`, building and caching it on
    /// first use.
    pub fn get_or_build<E: MappedEntity>(&self) -> Arc<ConstructionStrategy<E>> {
        let type_id = TypeId::of::<E>();
        if let Some(existing) = self.strategies.get(&type_id) {
            if let Ok(strategy) = existing.clone().downcast::<ConstructionStrategy<E>>() {
                log::debug!("using cached construction strategy for {}", std::any::type_name::<E>());
                return strategy;
            }
        }
        log::info!("building construction strategy for {}", std::any::type_name::<E>());
        let built = Arc::new(E::build_construction_strategy());
        self.strategies.insert(type_id, built.clone());
        built
    }

    pub fn clear(&self) {
        self.strategies.clear();
    }
}

impl Default for StrategyCache {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_STRATEGY_CACHE: Lazy<StrategyCache> = Lazy::new(StrategyCache::new);

pub fn global() -> &'static StrategyCache {
    &GLOBAL_STRATEGY_CACHE
}
