//! Scalar conversion, shared between the facade's `execute_scalar`
//! short-circuit (no live reader, a bare `DbValue`) and
//! the grid reader's single-column short-circuit (a live reader it can
//! call the strongly-typed accessor on).

use crate::coltype::{read_value, resolve_column_kind, ColumnType};
use crate::driver::RowReader;
use crate::error::MapperResult;
use crate::handlers::HandlerRegistry;

pub use crate::coltype::convert_scalar;

/// Reads the first column of the reader's current row as `T`, absent
/// any row the caller is expected to have defaulted already. Goes
/// through the same handler-first, kind-dispatched path as a row
/// decoder's field, for parity with [`convert_scalar`] rather than a
/// second, divergent conversion.
pub fn read_scalar_column<T: ColumnType + Default>(
    reader: &dyn RowReader,
    registry: &HandlerRegistry,
) -> MapperResult<T> {
    if reader.field_count() == 0 || reader.is_null(0) {
        return Ok(T::default());
    }
    let resolution = resolve_column_kind::<T>(registry);
    read_value::<T>(reader, 0, &resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DbTypeHint, DbValue};

    struct OneColumnRow(DbValue);

    #[async_trait::async_trait]
    impl RowReader for OneColumnRow {
        fn field_count(&self) -> usize {
            1
        }
        fn name(&self, _index: usize) -> &str {
            "value"
        }
        fn is_null(&self, _index: usize) -> bool {
            self.0.is_null()
        }
        fn get_value(&self, _index: usize) -> DbValue {
            self.0.clone()
        }
        fn get_typed(&self, _index: usize, _hint: DbTypeHint) -> MapperResult<DbValue> {
            Ok(self.0.clone())
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
    fn reads_first_column_as_requested_type() {
        let registry = HandlerRegistry::new();
        let row = OneColumnRow(DbValue::I64(7));
        let value: i64 = read_scalar_column(&row, &registry).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn null_column_yields_default() {
        let registry = HandlerRegistry::new();
        let row = OneColumnRow(DbValue::Null);
        let value: i64 = read_scalar_column(&row, &registry).unwrap();
        assert_eq!(value, 0);
    }
}
