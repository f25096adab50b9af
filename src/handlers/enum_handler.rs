//! Attribute-driven enum name mapping.
//!
//! Rust has no runtime attribute reflection, so declarative metadata on
//! each enum variant is expressed as a trait the enum implements: each
//! variant names its own database string, and the handler builds a
//! bidirectional lookup once, at construction, failing fast on an
//! ambiguous mapping.

use std::collections::HashMap;

use crate::driver::{DbTypeHint, DbValue, Parameter};
use crate::error::{MapperError, MapperResult};
use crate::handlers::TypeHandler;

/// Declarative metadata an enum type provides so it can be stored as a
/// string column.
pub trait DbEnum: Sized + Copy + PartialEq + Send + Sync + 'static {
    /// All variants, in declaration order.
    fn variants() -> &'static [Self];

    /// This variant's database representation.
    fn db_name(&self) -> &'static str;

    /// The database-side type name for drivers that need a hint (e.g. a
    /// named PostgreSQL enum type). `None` when the driver infers it from
    /// the column itself.
    fn db_type_name() -> Option<&'static str> {
        None
    }
}

/// Implements [`crate::coltype::ColumnType`] and [`crate::binder::BindableParam`]
/// for a type that already implements [`DbEnum`], using the same
/// case-insensitive name / integral-index fallback [`EnumHandler`] uses
/// when registered.
///
/// This has to be a macro rather than a blanket `impl<E: DbEnum> ColumnType
/// for E`: `ColumnType` already has concrete impls for every primitive and
/// a blanket impl for `Option<T>` in the same crate, and rustc rejects a
/// blanket impl over a local trait bound (`DbEnum`) alongside those — it
/// has no way to prove some other type here won't also implement
/// `DbEnum`. Invoke this once per enum, after implementing `DbEnum`.
#[macro_export]
macro_rules! impl_db_enum_mapping {
    ($t:ty) => {
        impl $crate::coltype::ColumnType for $t {
            fn kind_hint() -> $crate::coltype::ColumnKindHint {
                $crate::coltype::ColumnKindHint::Enum
            }

            fn from_db_value(raw: $crate::driver::DbValue) -> $crate::error::MapperResult<Self> {
                $crate::coltype::decode_enum_value(raw)
            }
        }

        impl $crate::binder::BindableParam for $t {
            fn to_db_value(&self) -> $crate::driver::DbValue {
                $crate::binder::encode_enum_value(self)
            }

            fn default_hint() -> $crate::driver::DbTypeHint {
                $crate::driver::DbTypeHint::Text
            }
        }
    };
}

/// A [`TypeHandler`] for any [`DbEnum`], built once from its declared
/// variant names.
pub struct EnumHandler<E: DbEnum> {
    by_name: HashMap<&'static str, E>,
}

impl<E: DbEnum> EnumHandler<E> {
    /// Builds the bidirectional lookup. Fails if two variants declare the
    /// same database name — an ambiguous mapping `parse` could never
    /// resolve.
    pub fn new() -> MapperResult<Self> {
        let mut by_name = HashMap::new();
        for variant in E::variants() {
            let name = variant.db_name();
            if by_name.insert(name, *variant).is_some() {
                return Err(MapperError::invalid_entity(
                    std::any::type_name::<E>(),
                    format!("two variants share the database name `{name}`"),
                ));
            }
        }
        Ok(Self { by_name })
    }
}

impl<E: DbEnum> TypeHandler<E> for EnumHandler<E> {
    fn set(&self, param: &mut dyn Parameter, value: &E) -> MapperResult<()> {
        param.set_value(DbValue::Str(value.db_name().to_string()));
        param.set_type_hint(DbTypeHint::Text);
        Ok(())
    }

    fn parse(&self, raw: &DbValue) -> MapperResult<E> {
        match raw {
            DbValue::Str(s) => {
                if let Some(variant) = self.by_name.get(s.as_str()) {
                    return Ok(*variant);
                }
                self.by_name
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(s))
                    .map(|(_, variant)| *variant)
                    .ok_or_else(|| {
                        MapperError::handler_contract(
                            std::any::type_name::<E>(),
                            format!("`{s}` does not match any variant's database name"),
                        )
                    })
            }
            other => Err(MapperError::handler_contract(
                std::any::type_name::<E>(),
                format!("expected a string database value, got {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Status {
        Active,
        Inactive,
    }

    impl DbEnum for Status {
        fn variants() -> &'static [Self] {
            &[Status::Active, Status::Inactive]
        }

        fn db_name(&self) -> &'static str {
            match self {
                Status::Active => "active",
                Status::Inactive => "inactive",
            }
        }
    }

    #[test]
    fn round_trips_through_db_name() {
        let handler = EnumHandler::<Status>::new().unwrap();
        let raw = DbValue::Str("active".to_string());
        assert_eq!(handler.parse(&raw).unwrap(), Status::Active);
    }

    #[test]
    fn parse_is_case_insensitive_fallback() {
        let handler = EnumHandler::<Status>::new().unwrap();
        let raw = DbValue::Str("INACTIVE".to_string());
        assert_eq!(handler.parse(&raw).unwrap(), Status::Inactive);
    }

    #[test]
    fn duplicate_db_names_fail_fast() {
        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Bad {
            A,
            B,
        }
        impl DbEnum for Bad {
            fn variants() -> &'static [Self] {
                &[Bad::A, Bad::B]
            }
            fn db_name(&self) -> &'static str {
                "same"
            }
        }
        assert!(EnumHandler::<Bad>::new().is_err());
    }
}
