//! Reference driver adapter over `sqlx::Any`. The wire protocol and
//! connection lifecycle stay out of the core's scope; this module is
//! one concrete, testable `Connection`/`Command` implementation, not
//! part of it.
//!
//! `sqlx::Any` covers SQLite, MySQL, and PostgreSQL behind one pool
//! type, which keeps this adapter a single implementation rather than
//! one per backend — appropriate for a reference adapter meant to prove
//! the trait boundary works end to end, not to be a production driver.

use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Column, Row, TypeInfo, ValueRef};

use crate::driver::{Command, Connection, DbTypeHint, DbValue, Parameter, RowReader, Transaction};
use crate::error::{MapperError, MapperResult};

/// A lazily-opened `sqlx::Any` connection pool.
pub struct SqlxAnyConnection {
    url: String,
    pool: Option<AnyPool>,
}

impl SqlxAnyConnection {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: None,
        }
    }
}

#[async_trait]
impl Connection for SqlxAnyConnection {
    fn is_open(&self) -> bool {
        self.pool.is_some()
    }

    async fn open(&mut self) -> MapperResult<()> {
        if self.pool.is_some() {
            return Ok(());
        }
        let pool = AnyPoolOptions::new()
            .connect(&self.url)
            .await
            .map_err(|e| MapperError::driver_failure(self.url.clone(), e))?;
        self.pool = Some(pool);
        Ok(())
    }

    fn create_command(&self) -> Box<dyn Command> {
        Box::new(SqlxAnyCommand {
            pool: self.pool.clone(),
            sql: String::new(),
            params: Vec::new(),
        })
    }
}

/// A bound parameter, holding exactly the generic `DbValue`/`DbTypeHint`
/// pair the core writes into it.
pub struct SqlxAnyParameter {
    name: String,
    value: DbValue,
    hint: DbTypeHint,
}

impl Default for SqlxAnyParameter {
    fn default() -> Self {
        Self {
            name: String::new(),
            value: DbValue::Null,
            hint: DbTypeHint::Auto,
        }
    }
}

impl Parameter for SqlxAnyParameter {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
    fn set_value(&mut self, value: DbValue) {
        self.value = value;
    }
    fn set_type_hint(&mut self, hint: DbTypeHint) {
        self.hint = hint;
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn value(&self) -> &DbValue {
        &self.value
    }
    fn type_hint(&self) -> DbTypeHint {
        self.hint
    }
}

pub struct SqlxAnyCommand {
    pool: Option<AnyPool>,
    sql: String,
    params: Vec<SqlxAnyParameter>,
}

impl SqlxAnyCommand {
    fn pool(&self) -> MapperResult<&AnyPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| MapperError::driver_failure(self.sql.clone(), NotOpenError))
    }

    fn bind_query<'q>(&self, mut query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
        for param in &self.params {
            query = bind_one(query, param.value());
        }
        query
    }
}

#[derive(Debug)]
struct NotOpenError;

impl std::fmt::Display for NotOpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection has not been opened")
    }
}

impl std::error::Error for NotOpenError {}

fn bind_one<'q>(
    query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    value: &DbValue,
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    match value.clone() {
        DbValue::Null => query.bind(None::<String>),
        DbValue::Bool(b) => query.bind(b),
        DbValue::I16(n) => query.bind(n as i32),
        DbValue::I32(n) => query.bind(n),
        DbValue::I64(n) => query.bind(n),
        DbValue::F32(n) => query.bind(n as f64),
        DbValue::F64(n) => query.bind(n),
        DbValue::Decimal(d) => query.bind(d.to_string()),
        DbValue::Str(s) => query.bind(s),
        DbValue::Bytes(b) => query.bind(b),
        DbValue::Uuid(u) => query.bind(u.to_string()),
        DbValue::Date(d) => query.bind(d.to_string()),
        DbValue::Time(t) => query.bind(t.to_string()),
        DbValue::DateTime(dt) => query.bind(dt.to_string()),
        DbValue::DateTimeUtc(dt) => query.bind(dt.to_rfc3339()),
        DbValue::Json(v) => query.bind(v.to_string()),
        DbValue::Array(_) => query.bind(value.to_string_fallback()),
    }
}

impl DbValue {
    /// `sqlx::Any` has no native array/set-membership binding; this
    /// reference adapter falls back to a comma-joined string, which is
    /// only useful for drivers that accept it (e.g. via a user-defined
    /// function). A real per-backend driver would expand this into
    /// `IN (?, ?, ...)` placeholders instead.
    fn to_string_fallback(&self) -> String {
        match self {
            DbValue::Array(items) => items
                .iter()
                .map(|v| format!("{v:?}"))
                .collect::<Vec<_>>()
                .join(","),
            other => format!("{other:?}"),
        }
    }
}

#[async_trait]
impl Command for SqlxAnyCommand {
    fn set_sql(&mut self, sql: &str) {
        self.sql = sql.to_string();
    }

    fn set_transaction(&mut self, _tx: Option<&dyn Transaction>) {
        // This adapter executes directly against the pool; a caller
        // needing transactional execution drives `sqlx::Any` itself and
        // implements `Connection`/`Command` against its own transaction
        // handle instead of this reference adapter.
    }

    fn create_parameter(&self) -> Box<dyn Parameter> {
        Box::new(SqlxAnyParameter::default())
    }

    fn add_parameter(&mut self, param: Box<dyn Parameter>) {
        self.params.push(SqlxAnyParameter {
            name: param.name().to_string(),
            value: param.value().clone(),
            hint: param.type_hint(),
        });
    }

    async fn execute_non_query(&mut self) -> MapperResult<u64> {
        let pool = self.pool()?;
        let query = self.bind_query(sqlx::query(&self.sql));
        let result = query
            .execute(pool)
            .await
            .map_err(|e| MapperError::driver_failure(self.sql.clone(), e))?;
        Ok(result.rows_affected())
    }

    async fn execute_scalar(&mut self) -> MapperResult<Option<DbValue>> {
        let pool = self.pool()?;
        let query = self.bind_query(sqlx::query(&self.sql));
        let row = query
            .fetch_optional(pool)
            .await
            .map_err(|e| MapperError::driver_failure(self.sql.clone(), e))?;
        Ok(row.map(|r| column_value(&r, 0)))
    }

    async fn execute_reader(&mut self) -> MapperResult<Box<dyn RowReader>> {
        let pool = self.pool()?;
        let query = self.bind_query(sqlx::query(&self.sql));
        let rows = query
            .fetch_all(pool)
            .await
            .map_err(|e| MapperError::driver_failure(self.sql.clone(), e))?;
        Ok(Box::new(SqlxAnyRowReader {
            rows,
            position: None,
        }))
    }
}

/// Forward-only reader over an already-materialised `Vec<AnyRow>`.
/// `sqlx::Any` streams rows through a cursor in real usage; this
/// reference adapter fetches eagerly for simplicity, which is fine for
/// the reference/test scenarios it is built for.
pub struct SqlxAnyRowReader {
    rows: Vec<sqlx::any::AnyRow>,
    position: Option<usize>,
}

fn column_value(row: &sqlx::any::AnyRow, index: usize) -> DbValue {
    let column = &row.columns()[index];
    let type_name = column.type_info().name();
    if row.try_get_raw(index).map(|raw| raw.is_null()).unwrap_or(true) {
        return DbValue::Null;
    }
    match type_name {
        "BOOL" | "BOOLEAN" => row.try_get::<bool, _>(index).map(DbValue::Bool).unwrap_or(DbValue::Null),
        "SMALLINT" | "INT2" => row.try_get::<i16, _>(index).map(DbValue::I16).unwrap_or(DbValue::Null),
        "INT" | "INTEGER" | "INT4" => row.try_get::<i32, _>(index).map(DbValue::I32).unwrap_or(DbValue::Null),
        "BIGINT" | "INT8" => row.try_get::<i64, _>(index).map(DbValue::I64).unwrap_or(DbValue::Null),
        "REAL" | "FLOAT4" => row.try_get::<f32, _>(index).map(DbValue::F32).unwrap_or(DbValue::Null),
        "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" => {
            row.try_get::<f64, _>(index).map(DbValue::F64).unwrap_or(DbValue::Null)
        }
        "BLOB" | "BYTEA" => row.try_get::<Vec<u8>, _>(index).map(DbValue::Bytes).unwrap_or(DbValue::Null),
        _ => row.try_get::<String, _>(index).map(DbValue::Str).unwrap_or(DbValue::Null),
    }
}

#[async_trait]
impl RowReader for SqlxAnyRowReader {
    fn field_count(&self) -> usize {
        self.rows.first().map(|r| r.columns().len()).unwrap_or(0)
    }

    fn name(&self, index: usize) -> &str {
        self.rows[self.position.unwrap_or(0)].columns()[index].name()
    }

    fn is_null(&self, index: usize) -> bool {
        match self.position {
            Some(pos) => self.rows[pos]
                .try_get_raw(index)
                .map(|raw| raw.is_null())
                .unwrap_or(true),
            None => true,
        }
    }

    fn get_value(&self, index: usize) -> DbValue {
        match self.position {
            Some(pos) => column_value(&self.rows[pos], index),
            None => DbValue::Null,
        }
    }

    fn get_typed(&self, index: usize, _hint: DbTypeHint) -> MapperResult<DbValue> {
        Ok(self.get_value(index))
    }

    async fn read(&mut self) -> MapperResult<bool> {
        let next = self.position.map(|p| p + 1).unwrap_or(0);
        if next >= self.rows.len() {
            return Ok(false);
        }
        self.position = Some(next);
        Ok(true)
    }

    async fn next_result(&mut self) -> MapperResult<bool> {
        // `sqlx::Any`'s `fetch_all` surfaces a single result set; a
        // multi-statement batch would need one `execute_reader` call per
        // statement upstream of this adapter.
        Ok(false)
    }

    fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }
}
