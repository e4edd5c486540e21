//! Database adapters.
//!
//! A [`Dialect`] knows how to introspect one database engine and how to turn
//! already-translated records into statements for it. Entities never branch
//! on the engine: they ask for [`Capabilities`] and call the trait.
//!
//! Every method receives the connection explicitly, so the same adapter serves
//! a pooled client, a plain `tokio_postgres::Client` or a transaction.

mod postgres;

pub use postgres::Postgres;

use crate::client::GenericClient;
use crate::error::{MapperError, MapperResult};
use crate::ident::Ident;
use crate::model::FieldModel;
use crate::naming::NameTranslator;
use crate::sql::Sql;
use crate::value::Record;
use std::fmt;
use std::future::Future;

/// What an adapter can do. Consulted instead of the adapter's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// [`Dialect::insert_many`] is implemented.
    pub batch_insert: bool,
    /// [`Dialect::list_enum_values`] returns enum labels.
    pub enum_listing: bool,
    /// [`Dialect::list_columns`] fills [`ColumnRow::enum_labels`].
    pub inline_enum_labels: bool,
    /// Primary keys of any type are accepted. When `false` only integer,
    /// uuid and serial keys are.
    pub typed_primary_keys: bool,
}

/// A table, optionally schema-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// The quoted identifier for statements.
    pub fn ident(&self) -> MapperResult<Ident> {
        Ident::table(self.schema.as_deref(), &self.name)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// One column as reported by [`Dialect::list_columns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    /// Enum labels, for engines that report them with the column.
    pub enum_labels: Option<Vec<String>>,
}

impl ColumnRow {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable,
            enum_labels: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
    Other,
}

impl ConstraintKind {
    /// Map an `information_schema` style constraint type.
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "PRIMARY KEY" => Self::PrimaryKey,
            "FOREIGN KEY" => Self::ForeignKey,
            "UNIQUE" => Self::Unique,
            _ => Self::Other,
        }
    }
}

/// One (constraint, column) pair as reported by [`Dialect::list_constraints`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRow {
    pub constraint_name: String,
    pub kind: ConstraintKind,
    pub column_name: String,
    pub foreign_table_schema: Option<String>,
    pub foreign_table: Option<String>,
    pub foreign_column: Option<String>,
}

impl ConstraintRow {
    pub fn primary_key(constraint_name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            kind: ConstraintKind::PrimaryKey,
            column_name: column.into(),
            foreign_table_schema: None,
            foreign_table: None,
            foreign_column: None,
        }
    }

    pub fn foreign_key(
        constraint_name: impl Into<String>,
        column: impl Into<String>,
        foreign_table: impl Into<String>,
        foreign_column: impl Into<String>,
    ) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            kind: ConstraintKind::ForeignKey,
            column_name: column.into(),
            foreign_table_schema: None,
            foreign_table: Some(foreign_table.into()),
            foreign_column: Some(foreign_column.into()),
        }
    }
}

/// One enum label of one column, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumRow {
    pub column_name: String,
    pub label: String,
}

/// A database adapter.
///
/// Records passed to the mutation methods are keyed by storage (column) names,
/// except for [`Dialect::insert_many`], which receives raw caller input and
/// translates it itself. Every mutation returns the affected rows projected to
/// `returning`.
pub trait Dialect: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Execute a statement and decode every returned row.
    fn query<C: GenericClient>(
        &self,
        conn: &C,
        sql: Sql,
    ) -> impl Future<Output = MapperResult<Vec<Record>>> + Send;

    /// Base tables in the given schemas.
    fn list_tables<C: GenericClient>(
        &self,
        conn: &C,
        schemas: &[String],
    ) -> impl Future<Output = MapperResult<Vec<TableRef>>> + Send;

    /// Columns of `table` in ordinal order.
    fn list_columns<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
    ) -> impl Future<Output = MapperResult<Vec<ColumnRow>>> + Send;

    fn list_constraints<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
    ) -> impl Future<Output = MapperResult<Vec<ConstraintRow>>> + Send;

    /// Enum labels for the enum-typed columns of `table`.
    ///
    /// Only called when [`Capabilities::enum_listing`] is set.
    fn list_enum_values<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
    ) -> impl Future<Output = MapperResult<Vec<EnumRow>>> + Send {
        let _ = (conn, table);
        async { Ok(Vec::new()) }
    }

    /// Insert one row. When `generate_uuid` is set and the row carries no
    /// primary key, a fresh UUID is generated for it.
    fn insert_one<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
        row: &Record,
        primary_key: &str,
        generate_uuid: bool,
        returning: &[Ident],
    ) -> impl Future<Output = MapperResult<Record>> + Send;

    /// Insert several raw input rows in one statement.
    ///
    /// Only called when [`Capabilities::batch_insert`] is set. Rows are
    /// translated with `naming` before anything is sent.
    #[allow(clippy::too_many_arguments)]
    fn insert_many<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
        rows: Vec<Record>,
        naming: &NameTranslator,
        model: &FieldModel,
        returning: &[Ident],
    ) -> impl Future<Output = MapperResult<Vec<Record>>> + Send {
        let _ = (conn, table, rows, naming, model, returning);
        async { Err(MapperError::Unsupported("batch insert")) }
    }

    /// Update the row whose primary key equals `row[primary_key]`, setting every
    /// key of `row`. `None` when no row matched.
    fn update_one<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
        row: &Record,
        primary_key: &str,
        returning: &[Ident],
    ) -> impl Future<Output = MapperResult<Option<Record>>> + Send;

    /// Update every row matching all `criteria` (all rows when empty).
    fn update_many<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
        criteria: Vec<Sql>,
        row: &Record,
        returning: &[Ident],
    ) -> impl Future<Output = MapperResult<Vec<Record>>> + Send;

    /// Delete every row matching all `criteria` (all rows when empty).
    fn delete_all<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
        criteria: Vec<Sql>,
        returning: &[Ident],
    ) -> impl Future<Output = MapperResult<Vec<Record>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_ref_displays_and_quotes() {
        let t = TableRef::with_schema("public", "pages");
        assert_eq!(t.to_string(), "public.pages");
        assert_eq!(t.ident().unwrap().to_sql(), r#""public"."pages""#);

        let bare = TableRef::new("pages");
        assert_eq!(bare.to_string(), "pages");
        assert_eq!(bare.ident().unwrap().to_sql(), r#""pages""#);
    }

    #[test]
    fn constraint_kinds_from_type_names() {
        assert_eq!(
            ConstraintKind::from_type_name("PRIMARY KEY"),
            ConstraintKind::PrimaryKey
        );
        assert_eq!(
            ConstraintKind::from_type_name("FOREIGN KEY"),
            ConstraintKind::ForeignKey
        );
        assert_eq!(ConstraintKind::from_type_name("CHECK"), ConstraintKind::Other);
    }
}
