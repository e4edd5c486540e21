//! In-memory dialect and client for unit tests.

use crate::client::GenericClient;
use crate::dialect::{
    Capabilities, ColumnRow, ConstraintRow, Dialect, EnumRow, TableRef,
};
use crate::error::MapperResult;
use crate::ident::Ident;
use crate::model::FieldModel;
use crate::naming::NameTranslator;
use crate::sql::Sql;
use crate::value::Record;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// A client that is never expected to reach a server.
pub(crate) struct DummyClient;

impl GenericClient for DummyClient {
    async fn query(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> MapperResult<Vec<Row>> {
        Ok(vec![])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Query { sql: String, params: usize },
    InsertOne { row: Record, generate_uuid: bool, returning: Vec<String> },
    InsertMany { rows: Vec<Record> },
    UpdateOne { row: Record },
    UpdateMany { criteria: Vec<String>, row: Record },
    DeleteAll { criteria: Vec<String> },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockTable {
    pub columns: Vec<ColumnRow>,
    pub constraints: Vec<ConstraintRow>,
    pub enums: Vec<EnumRow>,
}

/// Serves a fixed catalog and records every statement-level call.
///
/// `insert_*` and `update_one` echo the row they receive; `update_one` finds
/// no row when the key is `404`. `query`, `update_many` and `delete_all`
/// return queued results (empty when none are queued).
#[derive(Default)]
pub(crate) struct MockDialect {
    pub caps: Capabilities,
    pub tables: Vec<(TableRef, MockTable)>,
    calls: Mutex<Vec<Call>>,
    results: Mutex<VecDeque<Vec<Record>>>,
}

pub(crate) fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

impl MockDialect {
    pub fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            ..Self::default()
        }
    }

    pub fn table(mut self, table: TableRef, definition: MockTable) -> Self {
        self.tables.push((table, definition));
        self
    }

    /// `pages(id <pk_type> pk, title varchar, body_content text,
    /// inserted_at timestamptz, updated_at timestamptz)`.
    pub fn pages(caps: Capabilities, pk_type: &str) -> Self {
        Self::new(caps).table(TableRef::with_schema("public", "pages"), pages_table(pk_type))
    }

    pub fn push_result(&self, rows: Vec<Record>) {
        self.results.lock().unwrap().push_back(rows);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record_call(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_result(&self) -> Vec<Record> {
        self.results.lock().unwrap().pop_front().unwrap_or_default()
    }

    fn lookup(&self, table: &TableRef) -> MockTable {
        self.tables
            .iter()
            .find(|(t, _)| t.name == table.name)
            .map(|(_, d)| d.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn pages_table(pk_type: &str) -> MockTable {
    MockTable {
        columns: vec![
            ColumnRow::new("id", pk_type, false),
            ColumnRow::new("title", "varchar", true),
            ColumnRow::new("body_content", "text", true),
            ColumnRow::new("inserted_at", "timestamptz", true),
            ColumnRow::new("updated_at", "timestamptz", true),
        ],
        constraints: vec![ConstraintRow::primary_key("pages_pkey", "id")],
        enums: Vec::new(),
    }
}

fn sql_list(fragments: Vec<Sql>) -> Vec<String> {
    fragments.iter().map(Sql::to_sql).collect()
}

impl Dialect for MockDialect {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    async fn query<C: GenericClient>(&self, _conn: &C, sql: Sql) -> MapperResult<Vec<Record>> {
        sql.validate()?;
        self.record_call(Call::Query {
            sql: sql.to_sql(),
            params: sql.param_count(),
        });
        Ok(self.next_result())
    }

    async fn list_tables<C: GenericClient>(
        &self,
        _conn: &C,
        schemas: &[String],
    ) -> MapperResult<Vec<TableRef>> {
        Ok(self
            .tables
            .iter()
            .filter(|(t, _)| t.schema.as_ref().is_none_or(|s| schemas.contains(s)))
            .map(|(t, _)| t.clone())
            .collect())
    }

    async fn list_columns<C: GenericClient>(
        &self,
        _conn: &C,
        table: &TableRef,
    ) -> MapperResult<Vec<ColumnRow>> {
        Ok(self.lookup(table).columns)
    }

    async fn list_constraints<C: GenericClient>(
        &self,
        _conn: &C,
        table: &TableRef,
    ) -> MapperResult<Vec<ConstraintRow>> {
        Ok(self.lookup(table).constraints)
    }

    async fn list_enum_values<C: GenericClient>(
        &self,
        _conn: &C,
        table: &TableRef,
    ) -> MapperResult<Vec<EnumRow>> {
        Ok(self.lookup(table).enums)
    }

    async fn insert_one<C: GenericClient>(
        &self,
        _conn: &C,
        _table: &TableRef,
        row: &Record,
        primary_key: &str,
        generate_uuid: bool,
        returning: &[Ident],
    ) -> MapperResult<Record> {
        self.record_call(Call::InsertOne {
            row: row.clone(),
            generate_uuid,
            returning: returning.iter().map(Ident::to_sql).collect(),
        });
        let mut out = row.clone();
        out.entry(primary_key.to_string()).or_insert(json!(1));
        Ok(out)
    }

    async fn insert_many<C: GenericClient>(
        &self,
        _conn: &C,
        _table: &TableRef,
        rows: Vec<Record>,
        naming: &NameTranslator,
        _model: &FieldModel,
        _returning: &[Ident],
    ) -> MapperResult<Vec<Record>> {
        let rows = rows
            .into_iter()
            .map(|r| naming.fix_input(r))
            .collect::<MapperResult<Vec<_>>>()?;
        self.record_call(Call::InsertMany { rows: rows.clone() });
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                r.entry(naming.primary_key().to_string())
                    .or_insert(json!(i + 1));
                r
            })
            .collect())
    }

    async fn update_one<C: GenericClient>(
        &self,
        _conn: &C,
        _table: &TableRef,
        row: &Record,
        primary_key: &str,
        _returning: &[Ident],
    ) -> MapperResult<Option<Record>> {
        self.record_call(Call::UpdateOne { row: row.clone() });
        if row.get(primary_key) == Some(&json!(404)) {
            return Ok(None);
        }
        Ok(Some(row.clone()))
    }

    async fn update_many<C: GenericClient>(
        &self,
        _conn: &C,
        _table: &TableRef,
        criteria: Vec<Sql>,
        row: &Record,
        _returning: &[Ident],
    ) -> MapperResult<Vec<Record>> {
        self.record_call(Call::UpdateMany {
            criteria: sql_list(criteria),
            row: row.clone(),
        });
        Ok(self.next_result())
    }

    async fn delete_all<C: GenericClient>(
        &self,
        _conn: &C,
        _table: &TableRef,
        criteria: Vec<Sql>,
        _returning: &[Ident],
    ) -> MapperResult<Vec<Record>> {
        self.record_call(Call::DeleteAll {
            criteria: sql_list(criteria),
        });
        Ok(self.next_result())
    }
}
