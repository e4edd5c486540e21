use super::{Capabilities, ColumnRow, ConstraintKind, ConstraintRow, Dialect, EnumRow, TableRef};
use crate::client::GenericClient;
use crate::error::{MapperError, MapperResult};
use crate::ident::Ident;
use crate::model::FieldModel;
use crate::naming::NameTranslator;
use crate::row::RowExt;
use crate::sql::Sql;
use crate::value::{Record, is_blank_key};
use serde_json::Value;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use uuid::Uuid;

const DEFAULT_SCHEMA: &str = "public";

const LIST_TABLES: &str = r#"
SELECT n.nspname AS table_schema, c.relname AS table_name
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind IN ('r', 'p')
  AND n.nspname = ANY($1::text[])
ORDER BY n.nspname, c.relname
"#;

const LIST_COLUMNS: &str = r#"
SELECT a.attname AS column_name,
       t.typname AS udt_name,
       NOT a.attnotnull AS is_nullable
FROM pg_catalog.pg_attribute a
JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_type t ON t.oid = a.atttypid
WHERE c.relname = $1::text
  AND n.nspname = $2::text
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum
"#;

const LIST_CONSTRAINTS: &str = r#"
SELECT con.conname AS constraint_name,
       CASE con.contype
         WHEN 'p' THEN 'PRIMARY KEY'
         WHEN 'f' THEN 'FOREIGN KEY'
         WHEN 'u' THEN 'UNIQUE'
       END AS constraint_type,
       a.attname AS column_name,
       fn.nspname AS foreign_table_schema,
       fc.relname AS foreign_table_name,
       fa.attname AS foreign_column_name
FROM pg_catalog.pg_constraint con
JOIN pg_catalog.pg_class c ON c.oid = con.conrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, fattnum, ord)
JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
LEFT JOIN pg_catalog.pg_class fc ON fc.oid = con.confrelid
LEFT JOIN pg_catalog.pg_namespace fn ON fn.oid = fc.relnamespace
LEFT JOIN pg_catalog.pg_attribute fa ON fa.attrelid = con.confrelid AND fa.attnum = k.fattnum
WHERE c.relname = $1::text
  AND n.nspname = $2::text
  AND con.contype IN ('p', 'f', 'u')
ORDER BY con.contype = 'p' DESC, con.conname, k.ord
"#;

const LIST_ENUM_VALUES: &str = r#"
SELECT a.attname AS column_name, e.enumlabel AS label
FROM pg_catalog.pg_attribute a
JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_enum e ON e.enumtypid = a.atttypid
WHERE c.relname = $1::text
  AND n.nspname = $2::text
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum, e.enumsortorder
"#;

/// PostgreSQL adapter.
///
/// Introspects through `pg_catalog`, appends `RETURNING` to every mutation and
/// inserts batches with a single multi-row `VALUES` statement.
#[derive(Debug, Clone, Copy)]
pub struct Postgres {
    batch_insert: bool,
}

impl Default for Postgres {
    fn default() -> Self {
        Self { batch_insert: true }
    }
}

impl Postgres {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert batches one row at a time.
    pub fn without_batch_insert(mut self) -> Self {
        self.batch_insert = false;
        self
    }

    async fn fetch<C: GenericClient>(
        conn: &C,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> MapperResult<Vec<Row>> {
        tracing::debug!(
            target: "pgmapper.sql",
            param_count = params.len(),
            sql = %sql.trim(),
            "executing statement"
        );
        conn.query(sql, params).await
    }

    fn table_params(table: &TableRef) -> (&str, &str) {
        (
            table.name.as_str(),
            table.schema.as_deref().unwrap_or(DEFAULT_SCHEMA),
        )
    }
}

fn push_assignments(sql: &mut Sql, row: &Record) -> MapperResult<()> {
    for (i, (column, value)) in row.iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        sql.push_ident_ref(&Ident::column(column)?)
            .push(" = ")
            .push_value(value.clone());
    }
    Ok(())
}

fn column_idents<'a>(columns: impl IntoIterator<Item = &'a String>) -> MapperResult<Vec<Ident>> {
    columns.into_iter().map(|c| Ident::column(c)).collect()
}

fn new_uuid() -> Value {
    Value::String(Uuid::new_v4().to_string())
}

impl Dialect for Postgres {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            batch_insert: self.batch_insert,
            enum_listing: true,
            inline_enum_labels: false,
            typed_primary_keys: true,
        }
    }

    async fn query<C: GenericClient>(&self, conn: &C, sql: Sql) -> MapperResult<Vec<Record>> {
        sql.validate()?;
        let text = sql.to_sql();
        let params = sql.params_ref();
        let rows = Self::fetch(conn, &text, &params).await?;
        rows.iter().map(RowExt::to_record).collect()
    }

    async fn list_tables<C: GenericClient>(
        &self,
        conn: &C,
        schemas: &[String],
    ) -> MapperResult<Vec<TableRef>> {
        let schemas = schemas.to_vec();
        let rows = Self::fetch(conn, LIST_TABLES, &[&schemas]).await?;
        rows.iter()
            .map(|row| {
                Ok(TableRef::with_schema(
                    row.try_get_column::<String>("table_schema")?,
                    row.try_get_column::<String>("table_name")?,
                ))
            })
            .collect()
    }

    async fn list_columns<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
    ) -> MapperResult<Vec<ColumnRow>> {
        let (name, schema) = Self::table_params(table);
        let rows = Self::fetch(conn, LIST_COLUMNS, &[&name, &schema]).await?;
        rows.iter()
            .map(|row| {
                Ok(ColumnRow::new(
                    row.try_get_column::<String>("column_name")?,
                    row.try_get_column::<String>("udt_name")?,
                    row.try_get_column::<bool>("is_nullable")?,
                ))
            })
            .collect()
    }

    async fn list_constraints<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
    ) -> MapperResult<Vec<ConstraintRow>> {
        let (name, schema) = Self::table_params(table);
        let rows = Self::fetch(conn, LIST_CONSTRAINTS, &[&name, &schema]).await?;
        rows.iter()
            .map(|row| {
                let kind: String = row.try_get_column("constraint_type")?;
                Ok(ConstraintRow {
                    constraint_name: row.try_get_column("constraint_name")?,
                    kind: ConstraintKind::from_type_name(&kind),
                    column_name: row.try_get_column("column_name")?,
                    foreign_table_schema: row.try_get_column("foreign_table_schema")?,
                    foreign_table: row.try_get_column("foreign_table_name")?,
                    foreign_column: row.try_get_column("foreign_column_name")?,
                })
            })
            .collect()
    }

    async fn list_enum_values<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
    ) -> MapperResult<Vec<EnumRow>> {
        let (name, schema) = Self::table_params(table);
        let rows = Self::fetch(conn, LIST_ENUM_VALUES, &[&name, &schema]).await?;
        rows.iter()
            .map(|row| {
                Ok(EnumRow {
                    column_name: row.try_get_column("column_name")?,
                    label: row.try_get_column("label")?,
                })
            })
            .collect()
    }

    async fn insert_one<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
        row: &Record,
        primary_key: &str,
        generate_uuid: bool,
        returning: &[Ident],
    ) -> MapperResult<Record> {
        let mut row = row.clone();
        if generate_uuid && row.get(primary_key).is_none_or(is_blank_key) {
            row.insert(primary_key.to_string(), new_uuid());
        }

        let mut sql = Sql::new("INSERT INTO ");
        sql.push_ident_ref(&table.ident()?);
        if row.is_empty() {
            sql.push(" DEFAULT VALUES");
        } else {
            sql.push(" (")
                .push_ident_list(&column_idents(row.keys())?)
                .push(") VALUES (")
                .push_sql(Sql::join(
                    row.into_values().map(|value| {
                        let mut s = Sql::empty();
                        s.push_value(value);
                        s
                    }),
                    ", ",
                ))
                .push(")");
        }
        sql.push(" RETURNING ").push_ident_list(returning);

        self.query(conn, sql)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MapperError::Other(format!("INSERT INTO {table} returned no row")))
    }

    async fn insert_many<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
        rows: Vec<Record>,
        naming: &NameTranslator,
        model: &FieldModel,
        returning: &[Ident],
    ) -> MapperResult<Vec<Record>> {
        let primary_key = naming.primary_key();
        let generate_uuid = model.primary_key_field().is_some_and(|f| f.is_uuid());

        let mut translated = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row = naming.fix_input(row)?;
            if row.get(primary_key).is_some_and(is_blank_key) {
                row.shift_remove(primary_key);
            }
            if generate_uuid && !row.contains_key(primary_key) {
                row.insert(primary_key.to_string(), new_uuid());
            }
            translated.push(row);
        }

        let mut columns: Vec<String> = Vec::new();
        for row in &translated {
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        // VALUES cannot express a row without columns.
        if columns.is_empty() {
            let mut out = Vec::with_capacity(translated.len());
            for row in &translated {
                out.push(
                    self.insert_one(conn, table, row, primary_key, false, returning)
                        .await?,
                );
            }
            return Ok(out);
        }

        let mut sql = Sql::new("INSERT INTO ");
        sql.push_ident_ref(&table.ident()?)
            .push(" (")
            .push_ident_list(&column_idents(&columns)?)
            .push(") VALUES ");
        for (i, row) in translated.iter().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            sql.push("(");
            for (j, column) in columns.iter().enumerate() {
                if j > 0 {
                    sql.push(", ");
                }
                match row.get(column) {
                    Some(value) => sql.push_value(value.clone()),
                    None => sql.push("DEFAULT"),
                };
            }
            sql.push(")");
        }
        sql.push(" RETURNING ").push_ident_list(returning);

        self.query(conn, sql).await
    }

    async fn update_one<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
        row: &Record,
        primary_key: &str,
        returning: &[Ident],
    ) -> MapperResult<Option<Record>> {
        let key = row.get(primary_key).cloned().unwrap_or(Value::Null);

        let mut sql = Sql::new("UPDATE ");
        sql.push_ident_ref(&table.ident()?).push(" SET ");
        push_assignments(&mut sql, row)?;
        sql.push(" WHERE ")
            .push_ident_ref(&Ident::column(primary_key)?)
            .push(" = ")
            .push_value(key)
            .push(" RETURNING ")
            .push_ident_list(returning);

        Ok(self.query(conn, sql).await?.into_iter().next())
    }

    async fn update_many<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
        criteria: Vec<Sql>,
        row: &Record,
        returning: &[Ident],
    ) -> MapperResult<Vec<Record>> {
        let mut sql = Sql::new("UPDATE ");
        sql.push_ident_ref(&table.ident()?).push(" SET ");
        push_assignments(&mut sql, row)?;
        sql.push_where_and(criteria)
            .push(" RETURNING ")
            .push_ident_list(returning);

        self.query(conn, sql).await
    }

    async fn delete_all<C: GenericClient>(
        &self,
        conn: &C,
        table: &TableRef,
        criteria: Vec<Sql>,
        returning: &[Ident],
    ) -> MapperResult<Vec<Record>> {
        let mut sql = Sql::new("DELETE FROM ");
        sql.push_ident_ref(&table.ident()?);
        sql.push_where_and(criteria)
            .push(" RETURNING ")
            .push_ident_list(returning);

        self.query(conn, sql).await
    }
}

#[cfg(test)]
mod tests;
