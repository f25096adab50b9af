//! Multi-result-set sequencing.

use std::sync::Arc;

use crate::coltype::ColumnType;
use crate::decode::{self, scalar};
use crate::driver::{CancelSignal, Command, RowReader};
use crate::error::{MapperError, MapperResult};
use crate::handlers::HandlerRegistry;
use crate::reflect::MappedEntity;

/// Reads the result sets of a multi-statement execution in order.
/// Entity rows and bare scalar columns go through separate read methods
/// — `MappedEntity` and `ColumnType` are disjoint by construction, so
/// there is no runtime branching to decide which applies, only a
/// choice the caller makes once per result set. Releases the
/// underlying reader and command when dropped, whether or not every
/// result set was consumed.
pub struct GridReader {
    reader: Box<dyn RowReader>,
    #[allow(dead_code)]
    command: Box<dyn Command>,
    cancel: Arc<dyn CancelSignal>,
    needs_advance: bool,
}

impl GridReader {
    pub fn new(reader: Box<dyn RowReader>, command: Box<dyn Command>, cancel: Arc<dyn CancelSignal>) -> Self {
        Self {
            reader,
            command,
            cancel,
            needs_advance: false,
        }
    }

    /// The first `read_*` call decodes the result set the reader is
    /// already positioned on; every later one advances to the next
    /// result set first. A manual [`next_result`](Self::next_result)
    /// call in between clears the pending advance so the two don't
    /// double up.
    async fn begin_read(&mut self) -> MapperResult<bool> {
        let available = if self.needs_advance {
            self.reader.next_result().await?
        } else {
            true
        };
        self.needs_advance = true;
        Ok(available)
    }

    /// Decodes every row of the current result set into `E`.
    pub async fn read_entities<E: MappedEntity>(&mut self, registry: &HandlerRegistry) -> MapperResult<Vec<E>> {
        if !self.begin_read().await? {
            return Ok(Vec::new());
        }
        let columns: Vec<String> = (0..self.reader.field_count())
            .map(|i| self.reader.name(i).to_string())
            .collect();
        let plan = decode::global().get_or_build::<E>(&columns, registry);
        let mut rows = Vec::new();
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if !self.reader.read().await? {
                break;
            }
            rows.push(decode::materialize_row(&plan, self.reader.as_ref())?);
        }
        Ok(rows)
    }

    /// Decodes exactly one row of the current result set into `E`.
    pub async fn read_single_entity<E: MappedEntity>(&mut self, registry: &HandlerRegistry) -> MapperResult<E> {
        if !self.begin_read().await? {
            return Err(MapperError::SequenceEmpty);
        }
        if self.cancel.is_cancelled() {
            return Err(MapperError::Cancelled);
        }
        let columns: Vec<String> = (0..self.reader.field_count())
            .map(|i| self.reader.name(i).to_string())
            .collect();
        let plan = decode::global().get_or_build::<E>(&columns, registry);
        if !self.reader.read().await? {
            return Err(MapperError::SequenceEmpty);
        }
        let entity = decode::materialize_row(&plan, self.reader.as_ref())?;
        if self.reader.read().await? {
            return Err(MapperError::SequenceMultiple);
        }
        Ok(entity)
    }

    /// Reads the current result set's single scalar column, row by row,
    /// returning every value.
    pub async fn read_scalars<T: ColumnType + Default>(&mut self, registry: &HandlerRegistry) -> MapperResult<Vec<T>> {
        if !self.begin_read().await? {
            return Ok(Vec::new());
        }
        let mut values = Vec::new();
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if !self.reader.read().await? {
                break;
            }
            values.push(scalar::read_scalar_column::<T>(self.reader.as_ref(), registry)?);
        }
        Ok(values)
    }

    /// Reads exactly one scalar value from the current result set.
    pub async fn read_single_scalar<T: ColumnType + Default>(
        &mut self,
        registry: &HandlerRegistry,
    ) -> MapperResult<T> {
        if !self.begin_read().await? {
            return Err(MapperError::SequenceEmpty);
        }
        if self.cancel.is_cancelled() {
            return Err(MapperError::Cancelled);
        }
        let value = scalar::read_scalar_column::<T>(self.reader.as_ref(), registry)?;
        if self.reader.read().await? {
            return Err(MapperError::SequenceMultiple);
        }
        Ok(value)
    }

    /// Advances to the next result set. `Ok(false)` means there is none.
    pub async fn next_result(&mut self) -> MapperResult<bool> {
        self.needs_advance = false;
        self.reader.next_result().await
    }

    pub fn has_rows(&self) -> bool {
        self.reader.has_rows()
    }
}
