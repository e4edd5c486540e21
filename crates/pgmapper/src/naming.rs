//! Translation between external (lowerCamelCase) and storage (column) names.

use crate::error::{MapperError, MapperResult};
use crate::model::FieldModel;
use crate::value::Record;
use heck::ToLowerCamelCase;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// External name of a storage column: `updated_at` -> `updatedAt`.
pub fn external_name(storage: &str) -> String {
    storage.to_lower_camel_case()
}

/// Two fixed lookup tables built from a [`FieldModel`].
///
/// `fix_input` and `resolve` are strict and reject unknown names;
/// `compute_fields` is lenient and drops them.
#[derive(Debug, Clone)]
pub struct NameTranslator {
    to_storage: HashMap<String, String>,
    to_external: HashMap<String, String>,
    columns: Vec<String>,
    relation_columns: HashSet<String>,
    primary_key: String,
}

impl NameTranslator {
    /// Build the lookup tables.
    ///
    /// Fails with [`MapperError::NameCollision`] when two columns share an
    /// external name and with [`MapperError::MissingPrimaryKey`] when the model
    /// has no primary key.
    pub fn new(model: &FieldModel) -> MapperResult<Self> {
        let primary_key = model
            .primary_key()
            .ok_or_else(|| MapperError::MissingPrimaryKey(model.table().to_string()))?
            .to_string();

        let mut to_storage = HashMap::new();
        let mut to_external = HashMap::new();
        let mut columns = Vec::with_capacity(model.fields().len());
        for field in model.fields() {
            if let Some(first) = to_storage.insert(
                field.external_name().to_string(),
                field.name().to_string(),
            ) {
                return Err(MapperError::NameCollision {
                    external: field.external_name().to_string(),
                    first,
                    second: field.name().to_string(),
                });
            }
            to_external.insert(field.name().to_string(), field.external_name().to_string());
            columns.push(field.name().to_string());
        }

        let relation_columns = model
            .relations()
            .iter()
            .map(|r| r.column_name.clone())
            .collect();

        Ok(Self {
            to_storage,
            to_external,
            columns,
            relation_columns,
            primary_key,
        })
    }

    /// Storage name of the primary key.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn storage_name(&self, external: &str) -> Option<&str> {
        self.to_storage.get(external).map(String::as_str)
    }

    pub fn external_name(&self, storage: &str) -> Option<&str> {
        self.to_external.get(storage).map(String::as_str)
    }

    /// Resolve an external or storage name to a storage name.
    pub fn resolve<'a>(&'a self, name: &'a str) -> MapperResult<&'a str> {
        if let Some(storage) = self.storage_name(name) {
            return Ok(storage);
        }
        if self.to_external.contains_key(name) {
            return Ok(name);
        }
        Err(MapperError::UnknownField(name.to_string()))
    }

    /// Rekey caller input by storage names.
    pub fn fix_input(&self, input: Record) -> MapperResult<Record> {
        let mut out = Record::new();
        for (key, value) in input {
            let storage = self.resolve(&key)?.to_string();
            out.insert(storage, value);
        }
        Ok(out)
    }

    /// Rekey a row by external names and render the primary key as a string.
    pub fn fix_output(&self, row: Record) -> Record {
        let mut out = Record::new();
        for (key, value) in row {
            let value = if key == self.primary_key {
                stringify_key(value)
            } else {
                value
            };
            let key = match self.to_external.get(&key) {
                Some(external) => external.clone(),
                None => key,
            };
            out.insert(key, value);
        }
        out
    }

    /// Storage names to project for a requested field list.
    pub fn compute_fields(&self, requested: Option<&[String]>) -> Vec<String> {
        let Some(requested) = requested else {
            return self.columns.clone();
        };

        let mut out: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            let storage = if self.relation_columns.contains(name) {
                Some(name.as_str())
            } else {
                self.resolve(name).ok()
            };
            if let Some(storage) = storage {
                if !out.iter().any(|s| s == storage) {
                    out.push(storage.to_string());
                }
            }
        }

        if out.is_empty() {
            out.push(self.primary_key.clone());
        }
        out
    }
}

fn stringify_key(value: Value) -> Value {
    match value {
        Value::Null | Value::String(_) => value,
        other => Value::String(other.to_string()),
    }
}
