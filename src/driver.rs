//! The ADO-style driver abstraction the core consumes.
//!
//! Everything in this module is a trait. The underlying wire protocol,
//! connection pooling, and placeholder syntax are out of scope — a
//! driver is free to be `sqlx`, `tokio-postgres`, a hand-rolled TDS
//! client, or a test double, as long as it implements these traits.
//! [`crate::sqlx_any`] ships one reference implementation.

use async_trait::async_trait;

use crate::error::MapperResult;

/// A raw value read from, or written to, a driver parameter/column.
///
/// This is the wire-level vocabulary the core's built-in conversions
/// understand. A type handler may read any variant and is free to ignore
/// the ones it doesn't need.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(rust_decimal::Decimal),
    Str(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
    Json(serde_json::Value),
    /// Used for set-membership predicates (`name = ANY($1)`); never
    /// produced for byte arrays (those are `Bytes`).
    Array(Vec<DbValue>),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }
}

impl Default for DbValue {
    fn default() -> Self {
        DbValue::Null
    }
}

/// Hint passed to the driver so it can pick a concrete wire type for a
/// parameter. Drivers whose placeholder syntax carries no implicit type
/// (e.g. SQL Server) need this; drivers that infer type from the bound
/// value (e.g. PostgreSQL via `sqlx`) may ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbTypeHint {
    Auto,
    Bool,
    SmallInt,
    Int,
    BigInt,
    Real,
    Double,
    Decimal,
    Text,
    Binary,
    Uuid,
    Date,
    Time,
    DateTime,
    Json,
    Array,
}

impl Default for DbTypeHint {
    fn default() -> Self {
        DbTypeHint::Auto
    }
}

/// A driver parameter attached to a command before execution.
pub trait Parameter: Send {
    fn set_name(&mut self, name: &str);
    fn set_value(&mut self, value: DbValue);
    fn set_type_hint(&mut self, hint: DbTypeHint);

    /// Reads back what was set, so a driver's `Command::add_parameter`
    /// can bind the parameter without needing to downcast the boxed
    /// trait object it was handed.
    fn name(&self) -> &str;
    fn value(&self) -> &DbValue;
    fn type_hint(&self) -> DbTypeHint;
}

/// Opaque transaction handle accepted by [`Command::set_transaction`]. The
/// core never opens, commits, or rolls back a transaction — lifecycle
/// belongs to the caller's scoped session (an external collaborator).
pub trait Transaction: Send + Sync {}

/// Best-effort cooperative cancellation, forwarded to the driver at every
/// suspension point. A cancelled signal observed between rows truncates
/// the result list; observed during parameter binding it aborts the
/// command before `execute`.
pub trait CancelSignal: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// A signal that never cancels, used when the caller passes `None`.
pub struct NoCancel;

impl CancelSignal for NoCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A forward-only result-set reader, scoped to a single execution. Readers
/// release all underlying driver resources on drop, even on failure.
#[async_trait]
pub trait RowReader: Send {
    /// Number of columns in the current result set.
    fn field_count(&self) -> usize;

    /// Column name at `index`, stable for the lifetime of the current
    /// result set.
    fn name(&self, index: usize) -> &str;

    fn is_null(&self, index: usize) -> bool;

    /// The generic conversion of the raw value at `index`.
    fn get_value(&self, index: usize) -> DbValue;

    /// The strongly-typed accessor required for enum and date-only /
    /// time-only columns, where some drivers return an incorrect runtime
    /// type from the generic accessor.
    fn get_typed(&self, index: usize, hint: DbTypeHint) -> MapperResult<DbValue>;

    /// Advances to the next row. `Ok(false)` means the result set is
    /// exhausted.
    async fn read(&mut self) -> MapperResult<bool>;

    /// Advances to the next result set of a multi-statement execution.
    /// `Ok(false)` means there is no further result set.
    async fn next_result(&mut self) -> MapperResult<bool>;

    fn has_rows(&self) -> bool;
}

/// A command built from a SQL string, bound parameters, and an optional
/// transaction.
#[async_trait]
pub trait Command: Send {
    fn set_sql(&mut self, sql: &str);
    fn set_transaction(&mut self, tx: Option<&dyn Transaction>);
    fn create_parameter(&self) -> Box<dyn Parameter>;
    fn add_parameter(&mut self, param: Box<dyn Parameter>);

    async fn execute_non_query(&mut self) -> MapperResult<u64>;
    async fn execute_scalar(&mut self) -> MapperResult<Option<DbValue>>;
    async fn execute_reader(&mut self) -> MapperResult<Box<dyn RowReader>>;
}

/// An opaque database connection.
#[async_trait]
pub trait Connection: Send + Sync {
    fn is_open(&self) -> bool;
    async fn open(&mut self) -> MapperResult<()>;
    fn create_command(&self) -> Box<dyn Command>;
}
