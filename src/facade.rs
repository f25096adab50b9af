//! The query facade: the operations a caller actually invokes to run
//! SQL through a driver connection and get back mapped entities, bare
//! scalars, or a row count.

use std::sync::Arc;

use crate::binder::ParamSource;
use crate::coltype::ColumnType;
use crate::decode::{self, scalar};
use crate::driver::{CancelSignal, Command, Connection, NoCancel, Transaction};
use crate::error::{MapperError, MapperResult};
use crate::grid::GridReader;
use crate::handlers::{self, HandlerRegistry};
use crate::reflect::MappedEntity;

/// Everything a facade call needs beyond the SQL text and parameters:
/// which transaction (if any) to run inside, and which cancellation
/// signal to observe. Defaults to no transaction and a signal that
/// never cancels.
#[derive(Default, Clone)]
pub struct ExecutionContext<'a> {
    pub transaction: Option<&'a dyn Transaction>,
    pub cancel: Option<Arc<dyn CancelSignal>>,
}

impl<'a> ExecutionContext<'a> {
    pub fn with_transaction(tx: &'a dyn Transaction) -> Self {
        Self {
            transaction: Some(tx),
            cancel: None,
        }
    }

    pub fn with_cancel(cancel: Arc<dyn CancelSignal>) -> Self {
        Self {
            transaction: None,
            cancel: Some(cancel),
        }
    }

    fn cancel_signal(&self) -> Arc<dyn CancelSignal> {
        self.cancel.clone().unwrap_or_else(|| Arc::new(NoCancel))
    }
}

async fn prepare_command(
    conn: &mut dyn Connection,
    sql: &str,
    params: &dyn ParamSource,
    ctx: &ExecutionContext<'_>,
    registry: &HandlerRegistry,
) -> MapperResult<Box<dyn Command>> {
    if ctx.cancel_signal().is_cancelled() {
        return Err(MapperError::Cancelled);
    }
    if !conn.is_open() {
        conn.open().await?;
    }
    let mut command = conn.create_command();
    command.set_sql(sql);
    command.set_transaction(ctx.transaction);
    params.bind_all(command.as_mut(), registry)?;
    if ctx.cancel_signal().is_cancelled() {
        return Err(MapperError::Cancelled);
    }
    Ok(command)
}

/// Returns every row of the result set, mapped to `E`.
pub async fn query<E: MappedEntity>(
    conn: &mut dyn Connection,
    sql: &str,
    params: &dyn ParamSource,
    ctx: ExecutionContext<'_>,
) -> MapperResult<Vec<E>> {
    let registry = handlers::global();
    let mut command = prepare_command(conn, sql, params, &ctx, registry).await?;
    let mut reader = command.execute_reader().await?;
    let columns: Vec<String> = (0..reader.field_count())
        .map(|i| reader.name(i).to_string())
        .collect();
    let plan = decode::global().get_or_build::<E>(&columns, registry);
    let cancel = ctx.cancel_signal();
    let mut rows = Vec::new();
    loop {
        if cancel.is_cancelled() {
            break;
        }
        if !reader.read().await? {
            break;
        }
        rows.push(decode::materialize_row(&plan, reader.as_ref())?);
    }
    Ok(rows)
}

/// Requires exactly one row; errors on zero or more than one.
pub async fn query_single<E: MappedEntity>(
    conn: &mut dyn Connection,
    sql: &str,
    params: &dyn ParamSource,
    ctx: ExecutionContext<'_>,
) -> MapperResult<E> {
    let registry = handlers::global();
    let mut command = prepare_command(conn, sql, params, &ctx, registry).await?;
    let mut reader = command.execute_reader().await?;
    let columns: Vec<String> = (0..reader.field_count())
        .map(|i| reader.name(i).to_string())
        .collect();
    let plan = decode::global().get_or_build::<E>(&columns, registry);
    if ctx.cancel_signal().is_cancelled() {
        return Err(MapperError::Cancelled);
    }
    if !reader.read().await? {
        return Err(MapperError::SequenceEmpty);
    }
    let entity = decode::materialize_row(&plan, reader.as_ref())?;
    if reader.read().await? {
        return Err(MapperError::SequenceMultiple);
    }
    Ok(entity)
}

/// Like [`query_single`], but an empty result yields `E::default()`
/// instead of an error; more than one row is still an error.
pub async fn query_single_or_default<E: MappedEntity + Default>(
    conn: &mut dyn Connection,
    sql: &str,
    params: &dyn ParamSource,
    ctx: ExecutionContext<'_>,
) -> MapperResult<E> {
    let registry = handlers::global();
    let mut command = prepare_command(conn, sql, params, &ctx, registry).await?;
    let mut reader = command.execute_reader().await?;
    let columns: Vec<String> = (0..reader.field_count())
        .map(|i| reader.name(i).to_string())
        .collect();
    let plan = decode::global().get_or_build::<E>(&columns, registry);
    if ctx.cancel_signal().is_cancelled() {
        return Err(MapperError::Cancelled);
    }
    if !reader.read().await? {
        return Ok(E::default());
    }
    let entity = decode::materialize_row(&plan, reader.as_ref())?;
    if reader.read().await? {
        return Err(MapperError::SequenceMultiple);
    }
    Ok(entity)
}

/// Returns the first row, or `E::default()` if the result is empty; any
/// further rows are simply not read.
pub async fn query_first_or_default<E: MappedEntity + Default>(
    conn: &mut dyn Connection,
    sql: &str,
    params: &dyn ParamSource,
    ctx: ExecutionContext<'_>,
) -> MapperResult<E> {
    let registry = handlers::global();
    let mut command = prepare_command(conn, sql, params, &ctx, registry).await?;
    let mut reader = command.execute_reader().await?;
    let columns: Vec<String> = (0..reader.field_count())
        .map(|i| reader.name(i).to_string())
        .collect();
    let plan = decode::global().get_or_build::<E>(&columns, registry);
    if ctx.cancel_signal().is_cancelled() {
        return Err(MapperError::Cancelled);
    }
    if !reader.read().await? {
        return Ok(E::default());
    }
    decode::materialize_row(&plan, reader.as_ref())
}

/// Runs a non-query statement, returning the affected row count.
pub async fn execute(
    conn: &mut dyn Connection,
    sql: &str,
    params: &dyn ParamSource,
    ctx: ExecutionContext<'_>,
) -> MapperResult<u64> {
    let registry = handlers::global();
    let mut command = prepare_command(conn, sql, params, &ctx, registry).await?;
    command.execute_non_query().await
}

/// Runs a statement and converts its single scalar result to `T`,
/// defaulting on a null or missing value.
pub async fn execute_scalar<T: ColumnType + Default>(
    conn: &mut dyn Connection,
    sql: &str,
    params: &dyn ParamSource,
    ctx: ExecutionContext<'_>,
) -> MapperResult<T> {
    let registry = handlers::global();
    let mut command = prepare_command(conn, sql, params, &ctx, registry).await?;
    let raw = command.execute_scalar().await?;
    scalar::convert_scalar::<T>(raw, registry)
}

/// Runs a multi-statement batch, returning a [`GridReader`] positioned
/// at its first result set.
pub async fn query_multiple(
    conn: &mut dyn Connection,
    sql: &str,
    params: &dyn ParamSource,
    ctx: ExecutionContext<'_>,
) -> MapperResult<GridReader> {
    let registry = handlers::global();
    let cancel = ctx.cancel_signal();
    let mut command = prepare_command(conn, sql, params, &ctx, registry).await?;
    let reader = command.execute_reader().await?;
    Ok(GridReader::new(reader, command, cancel))
}
