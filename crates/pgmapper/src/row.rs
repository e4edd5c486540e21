//! Row access helpers

use crate::error::{MapperError, MapperResult};
use crate::value::{DynValue, Record};
use serde_json::Value;
use tokio_postgres::Row;
use tokio_postgres::types::FromSql;

/// Extension trait for reading `tokio_postgres::Row`s with mapper errors.
pub trait RowExt {
    /// Get a column value by name, returning a decode error on failure.
    fn try_get_column<'a, T>(&'a self, column: &str) -> MapperResult<T>
    where
        T: FromSql<'a>;

    /// Decode every column into a [`Record`] keyed by column name.
    fn to_record(&self) -> MapperResult<Record>;
}

impl RowExt for Row {
    fn try_get_column<'a, T>(&'a self, column: &str) -> MapperResult<T>
    where
        T: FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| MapperError::decode(column, e.to_string()))
    }

    fn to_record(&self) -> MapperResult<Record> {
        let mut record = Record::new();
        for (idx, column) in self.columns().iter().enumerate() {
            let value: Option<DynValue> = self
                .try_get(idx)
                .map_err(|e| MapperError::decode(column.name(), e.to_string()))?;
            record.insert(
                column.name().to_string(),
                value.map_or(Value::Null, |v| v.0),
            );
        }
        Ok(record)
    }
}
