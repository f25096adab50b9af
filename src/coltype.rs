//! Column classification and the built-in conversions: what a column's
//! `kind` is, and how to turn a raw [`DbValue`] into a concrete Rust
//! type once that kind is known.
//!
//! This is shared by the row decoder's per-column reads and by the
//! facade/grid scalar short-circuit, so the two paths cannot drift.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::driver::{DbTypeHint, DbValue, RowReader};
use crate::error::{MapperError, MapperResult};
use crate::handlers::{enum_handler::DbEnum, DynTypeHandler, HandlerRegistry};

/// The inherent classification of a Rust type, absent any registered
/// handler. Determines which of the driver's strongly-typed accessors
/// (`get_typed`) must be used instead of the generic `get_value` — some
/// drivers return incorrect runtime types from the generic accessor for
/// these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKindHint {
    Default,
    Enum,
    DateOnly,
    TimeOnly,
}

/// The resolved `kind` of a bound column.
#[derive(Clone)]
pub enum ColumnKind {
    Default,
    Handler(Arc<dyn DynTypeHandler>),
    Enum,
    DateOnly,
    TimeOnly,
}

/// Everything a decode plan needs to know about one bound column, minus
/// the ordinal (which depends on the row reader in play).
#[derive(Clone)]
pub struct ColumnResolution {
    pub underlying_type_id: TypeId,
    pub underlying_type_name: &'static str,
    pub kind: ColumnKind,
}

/// A Rust type usable as an entity field, constructor parameter, or
/// scalar query target.
///
/// Implemented for the primitive set directly and for `Option<T>`
/// (stripping the optional wrapper down to its underlying type). A
/// [`DbEnum`] type is opted in per type via [`crate::impl_db_enum_mapping`]
/// rather than through a blanket impl (see [`decode_enum_value`]).
pub trait ColumnType: Send + 'static {
    /// The declared type with any optional wrapper stripped.
    fn underlying_type_id() -> TypeId
    where
        Self: Sized,
    {
        TypeId::of::<Self>()
    }

    fn underlying_type_name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }

    fn kind_hint() -> ColumnKindHint
    where
        Self: Sized,
    {
        ColumnKindHint::Default
    }

    /// The built-in conversion from a raw driver value, used when no
    /// handler is registered for the underlying type.
    fn from_db_value(raw: DbValue) -> MapperResult<Self>
    where
        Self: Sized;

    /// Converts the type-erased output of a registered handler's `parse`
    /// into `Self`. A handler is always registered for the *underlying*
    /// type, so the default downcasts directly to `Self`; `Option<T>`
    /// overrides this to downcast to `T` and wrap the result in `Some`.
    fn from_handler_output(boxed: Box<dyn Any + Send>) -> MapperResult<Self>
    where
        Self: Sized,
    {
        boxed.downcast::<Self>().map(|b| *b).map_err(|_| {
            MapperError::handler_contract(
                std::any::type_name::<Self>(),
                "parse() produced a value of the wrong type",
            )
        })
    }
}

/// Resolves a column's `kind` for type `T`: handler-first, then the
/// type's inherent classification.
pub fn resolve_column_kind<T: ColumnType>(registry: &HandlerRegistry) -> ColumnResolution {
    let underlying_type_id = T::underlying_type_id();
    let underlying_type_name = T::underlying_type_name();
    let kind = if let Some(handler) = registry.try_get_dyn(underlying_type_id) {
        ColumnKind::Handler(handler)
    } else {
        match T::kind_hint() {
            ColumnKindHint::Enum => ColumnKind::Enum,
            ColumnKindHint::DateOnly => ColumnKind::DateOnly,
            ColumnKindHint::TimeOnly => ColumnKind::TimeOnly,
            ColumnKindHint::Default => ColumnKind::Default,
        }
    };
    ColumnResolution {
        underlying_type_id,
        underlying_type_name,
        kind,
    }
}

/// Reads column `ordinal` out of `reader` and converts it to `T`,
/// following the resolved `kind`. The caller
/// is responsible for the null check — a null column never reaches this
/// function for a setter binding (it is skipped) and is defaulted for a
/// constructor argument.
pub fn read_value<T: ColumnType>(
    reader: &dyn RowReader,
    ordinal: usize,
    resolution: &ColumnResolution,
) -> MapperResult<T> {
    match &resolution.kind {
        ColumnKind::Handler(handler) => {
            let raw = reader.get_value(ordinal);
            T::from_handler_output(handler.parse_dyn(&raw)?)
        }
        ColumnKind::Enum => {
            let raw = reader.get_typed(ordinal, DbTypeHint::Text)?;
            T::from_db_value(raw)
        }
        ColumnKind::DateOnly => {
            let raw = reader.get_typed(ordinal, DbTypeHint::Date)?;
            T::from_db_value(raw)
        }
        ColumnKind::TimeOnly => {
            let raw = reader.get_typed(ordinal, DbTypeHint::Time)?;
            T::from_db_value(raw)
        }
        ColumnKind::Default => {
            let raw = reader.get_value(ordinal);
            T::from_db_value(raw)
        }
    }
}

/// Converts a scalar value (from `Command::execute_scalar`, or a single
/// reader column with no driver-level typed accessor in play) to `T`,
/// defaulting on absence or null.
pub fn convert_scalar<T: ColumnType + Default>(
    value: Option<DbValue>,
    registry: &HandlerRegistry,
) -> MapperResult<T> {
    let raw = match value {
        None => return Ok(T::default()),
        Some(DbValue::Null) => return Ok(T::default()),
        Some(raw) => raw,
    };
    let resolution = resolve_column_kind::<T>(registry);
    match &resolution.kind {
        ColumnKind::Handler(handler) => T::from_handler_output(handler.parse_dyn(&raw)?),
        _ => T::from_db_value(raw),
    }
}

// --- built-in primitive conversions -----------------------------------

fn mismatch<T>(got: &DbValue) -> MapperError {
    MapperError::handler_contract(
        std::any::type_name::<T>(),
        format!("no built-in conversion from {got:?}"),
    )
}

impl ColumnType for bool {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::Bool(b) => Ok(b),
            DbValue::I16(n) => Ok(n != 0),
            DbValue::I32(n) => Ok(n != 0),
            DbValue::I64(n) => Ok(n != 0),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for i16 {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::I16(n) => Ok(n),
            DbValue::I32(n) => i16::try_from(n).map_err(|_| mismatch::<Self>(&DbValue::I32(n))),
            DbValue::I64(n) => i16::try_from(n).map_err(|_| mismatch::<Self>(&DbValue::I64(n))),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for i32 {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::I16(n) => Ok(n as i32),
            DbValue::I32(n) => Ok(n),
            DbValue::I64(n) => i32::try_from(n).map_err(|_| mismatch::<Self>(&DbValue::I64(n))),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for i64 {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::I16(n) => Ok(n as i64),
            DbValue::I32(n) => Ok(n as i64),
            DbValue::I64(n) => Ok(n),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for f32 {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::F32(n) => Ok(n),
            DbValue::F64(n) => Ok(n as f32),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for f64 {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::F32(n) => Ok(n as f64),
            DbValue::F64(n) => Ok(n),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for rust_decimal::Decimal {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        use rust_decimal::prelude::FromPrimitive;
        match raw {
            DbValue::Decimal(d) => Ok(d),
            DbValue::I64(n) => Ok(rust_decimal::Decimal::from(n)),
            DbValue::F64(n) => rust_decimal::Decimal::from_f64(n).ok_or_else(|| mismatch::<Self>(&DbValue::F64(n))),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for String {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::Str(s) => Ok(s),
            DbValue::Uuid(u) => Ok(u.to_string()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for Vec<u8> {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::Bytes(b) => Ok(b),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for uuid::Uuid {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::Uuid(u) => Ok(u),
            DbValue::Str(s) => uuid::Uuid::parse_str(&s).map_err(|e| {
                MapperError::handler_contract(std::any::type_name::<Self>(), e.to_string())
            }),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for chrono::NaiveDate {
    fn kind_hint() -> ColumnKindHint {
        ColumnKindHint::DateOnly
    }

    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::Date(d) => Ok(d),
            DbValue::DateTime(dt) => Ok(dt.date()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for chrono::NaiveTime {
    fn kind_hint() -> ColumnKindHint {
        ColumnKindHint::TimeOnly
    }

    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::Time(t) => Ok(t),
            DbValue::DateTime(dt) => Ok(dt.time()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for chrono::NaiveDateTime {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::DateTime(dt) => Ok(dt),
            DbValue::DateTimeUtc(dt) => Ok(dt.naive_utc()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for chrono::DateTime<chrono::Utc> {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::DateTimeUtc(dt) => Ok(dt),
            DbValue::DateTime(dt) => Ok(chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc)),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ColumnType for serde_json::Value {
    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        match raw {
            DbValue::Json(v) => Ok(v),
            DbValue::Str(s) => Ok(serde_json::Value::String(s)),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: ColumnType> ColumnType for Option<T> {
    fn underlying_type_id() -> TypeId {
        T::underlying_type_id()
    }

    fn underlying_type_name() -> &'static str {
        T::underlying_type_name()
    }

    fn kind_hint() -> ColumnKindHint {
        T::kind_hint()
    }

    fn from_db_value(raw: DbValue) -> MapperResult<Self> {
        Ok(Some(T::from_db_value(raw)?))
    }

    fn from_handler_output(boxed: Box<dyn Any + Send>) -> MapperResult<Self> {
        Ok(Some(T::from_handler_output(boxed)?))
    }
}

/// Built-in fallback conversion for any [`DbEnum`], used only when no
/// handler is registered for it: a string is matched case-insensitively
/// against each variant's declared database name;
/// anything else is interpreted as the zero-based index of its
/// underlying integral value.
///
/// Not a blanket `impl<E: DbEnum> ColumnType for E` — that would conflict
/// with every concrete impl above (a local trait bound gives rustc no way
/// to rule out some other type here also implementing `DbEnum`). Entity
/// authors opt an enum in with [`crate::impl_db_enum_mapping`] instead,
/// which calls this function from a concrete, non-overlapping impl.
pub fn decode_enum_value<E: DbEnum>(raw: DbValue) -> MapperResult<E> {
    match raw {
        DbValue::Str(s) => E::variants()
            .iter()
            .find(|v| v.db_name().eq_ignore_ascii_case(&s))
            .copied()
            .ok_or_else(|| {
                MapperError::handler_contract(
                    std::any::type_name::<E>(),
                    format!("`{s}` does not match any variant's database name"),
                )
            }),
        DbValue::I16(n) => enum_by_index::<E>(n as i64),
        DbValue::I32(n) => enum_by_index::<E>(n as i64),
        DbValue::I64(n) => enum_by_index::<E>(n),
        other => Err(mismatch::<E>(&other)),
    }
}

fn enum_by_index<E: DbEnum>(index: i64) -> MapperResult<E> {
    usize::try_from(index)
        .ok()
        .and_then(|i| E::variants().get(i))
        .copied()
        .ok_or_else(|| {
            MapperError::handler_contract(
                std::any::type_name::<E>(),
                format!("no variant at underlying integral value {index}"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_kind_for_primitives() {
        assert_eq!(i32::kind_hint(), ColumnKindHint::Default);
        assert_eq!(String::kind_hint(), ColumnKindHint::Default);
    }

    #[test]
    fn date_only_and_time_only_kinds() {
        assert_eq!(chrono::NaiveDate::kind_hint(), ColumnKindHint::DateOnly);
        assert_eq!(chrono::NaiveTime::kind_hint(), ColumnKindHint::TimeOnly);
    }

    #[test]
    fn option_strips_to_underlying_type() {
        assert_eq!(
            <Option<i32> as ColumnType>::underlying_type_id(),
            i32::underlying_type_id()
        );
    }

    #[test]
    fn numeric_widening_coercion() {
        let v: i64 = i64::from_db_value(DbValue::I32(7)).unwrap();
        assert_eq!(v, 7);
    }
}
