//! Entities: CRUD over one introspected table.
//!
//! An [`Entity`] is built once from a [`FieldModel`] and is immutable
//! afterwards. Every operation takes an [`Args`] bag, validates it, compiles
//! the statement and runs it through the entity's [`Dialect`], either on the
//! default connection or, through [`Entity::tx`], on a caller-supplied handle.
//!
//! ```ignore
//! let page = pages
//!     .save(Args::new().input(record(json!({ "title": "Hello" }))?))
//!     .await?;
//!
//! let found = pages
//!     .find(Args::from_json(json!({
//!         "where": { "title": { "like": "%ell%" } },
//!         "orderBy": [{ "field": "id", "direction": "desc" }],
//!         "limit": 5
//!     }))?)
//!     .await?;
//! ```

use crate::client::GenericClient;
use crate::config::{AutoTimestamp, LimitConfig, MapperConfig};
use crate::criteria::{Criteria, OrderBy, Where, compile_where};
use crate::dialect::{Dialect, TableRef};
use crate::error::{MapperError, MapperResult};
use crate::ident::Ident;
use crate::inflect;
use crate::model::{Field, FieldModel, Relation, load_field_model};
use crate::naming::NameTranslator;
use crate::sql::Sql;
use crate::value::{Record, format_timestamp, is_blank_key};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Arguments of an entity operation.
///
/// Each operation reads the subset it needs and ignores the rest.
/// Deserializes from `{ input, inputs, fields, where, orderBy, limit, offset }`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Args {
    /// Row for `save` and `update_many`.
    pub input: Option<Record>,
    /// Rows for `insert`.
    pub inputs: Option<Vec<Record>>,
    /// Projection; all fields when absent.
    pub fields: Option<Vec<String>>,
    #[serde(rename = "where")]
    pub filter: Where,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON argument shape.
    ///
    /// Filter errors keep their kind (`UnsupportedOperator`, ...); any other
    /// malformed key is a [`MapperError::Validation`].
    pub fn from_json(mut value: Value) -> MapperResult<Self> {
        let filter = value
            .as_object_mut()
            .and_then(|object| object.shift_remove("where"))
            .map(Where::try_from)
            .transpose()?
            .unwrap_or_default();
        let mut args: Args =
            serde_json::from_value(value).map_err(|e| MapperError::validation(e.to_string()))?;
        args.filter = filter;
        Ok(args)
    }

    pub fn input(mut self, input: Record) -> Self {
        self.input = Some(input);
        self
    }

    pub fn inputs(mut self, inputs: Vec<Record>) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// CRUD operations for one table.
pub struct Entity<C, D> {
    name: String,
    singular_name: String,
    plural_name: String,
    model: FieldModel,
    naming: NameTranslator,
    timestamps: AutoTimestamp,
    limit: LimitConfig,
    conn: Arc<C>,
    dialect: Arc<D>,
}

impl<C, D> Clone for Entity<C, D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            singular_name: self.singular_name.clone(),
            plural_name: self.plural_name.clone(),
            model: self.model.clone(),
            naming: self.naming.clone(),
            timestamps: self.timestamps.clone(),
            limit: self.limit,
            conn: Arc::clone(&self.conn),
            dialect: Arc::clone(&self.dialect),
        }
    }
}

impl<C, D> fmt::Debug for Entity<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("table", self.model.table())
            .field("primary_key", &self.naming.primary_key())
            .field("fields", &self.model.fields().len())
            .finish_non_exhaustive()
    }
}

impl<C, D> Entity<C, D> {
    /// Entity name, e.g. `Page` for `pages`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// e.g. `page`
    pub fn singular_name(&self) -> &str {
        &self.singular_name
    }

    /// e.g. `pages`
    pub fn plural_name(&self) -> &str {
        &self.plural_name
    }

    pub fn table(&self) -> &TableRef {
        self.model.table()
    }

    pub fn schema(&self) -> Option<&str> {
        self.model.table().schema.as_deref()
    }

    /// Storage name of the primary key.
    pub fn primary_key(&self) -> &str {
        self.naming.primary_key()
    }

    pub fn fields(&self) -> &[Field] {
        self.model.fields()
    }

    /// Look a field up by external or storage name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        let storage = self.naming.resolve(name).ok()?;
        self.model.get(storage)
    }

    pub fn relations(&self) -> &[Relation] {
        self.model.relations()
    }

    pub fn naming(&self) -> &NameTranslator {
        &self.naming
    }

    pub fn model(&self) -> &FieldModel {
        &self.model
    }

    pub fn limit_config(&self) -> LimitConfig {
        self.limit
    }

    /// The default connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }
}

impl<C: GenericClient, D: Dialect> Entity<C, D> {
    /// Freeze a field model into an entity.
    ///
    /// Fails when the table has no primary key or when two columns translate
    /// to the same external name.
    pub fn new(
        model: FieldModel,
        conn: Arc<C>,
        dialect: Arc<D>,
        config: &MapperConfig,
    ) -> MapperResult<Self> {
        let naming = NameTranslator::new(&model)?;
        let base = naming_base(model.table(), config);
        let entity = Self {
            name: inflect::entity_name(&base),
            singular_name: inflect::singular_name(&base),
            plural_name: inflect::plural_name(&base),
            model,
            naming,
            timestamps: config.auto_timestamp.clone(),
            limit: config.limit,
            conn,
            dialect,
        };
        debug!(
            entity = %entity.name,
            table = %entity.model.table(),
            primary_key = %entity.primary_key(),
            fields = entity.model.fields().len(),
            "entity built"
        );
        Ok(entity)
    }

    /// Introspect `table` and build its entity.
    pub async fn build(
        conn: Arc<C>,
        dialect: Arc<D>,
        table: TableRef,
        config: &MapperConfig,
    ) -> MapperResult<Self> {
        let ignore = config.ignored_columns(&table.name);
        let model = load_field_model(
            conn.as_ref(),
            dialect.as_ref(),
            &table,
            &ignore,
            &config.auto_timestamp,
        )
        .await?;
        Self::new(model, conn, dialect, config)
    }

    /// Run operations on `conn` (typically a transaction) instead of the
    /// default connection.
    pub fn tx<'a, T: GenericClient>(&'a self, conn: &'a T) -> EntityTx<'a, C, D, T> {
        EntityTx { entity: self, conn }
    }

    /// Rows matching `where`, ordered by `orderBy`, paginated.
    pub async fn find(&self, args: Args) -> MapperResult<Vec<Record>> {
        self.find_on(self.conn.as_ref(), args).await
    }

    /// Number of rows matching `where`.
    pub async fn count(&self, args: Args) -> MapperResult<i64> {
        self.count_on(self.conn.as_ref(), args).await
    }

    /// Update the row identified by the input's primary key, or insert the
    /// input when the key is absent, `null` or `""`.
    pub async fn save(&self, args: Args) -> MapperResult<Record> {
        self.save_on(self.conn.as_ref(), args).await
    }

    /// Insert every row of `inputs`.
    pub async fn insert(&self, args: Args) -> MapperResult<Vec<Record>> {
        self.insert_on(self.conn.as_ref(), args).await
    }

    /// Apply `input` to every row matching `where`.
    pub async fn update_many(&self, args: Args) -> MapperResult<Vec<Record>> {
        self.update_many_on(self.conn.as_ref(), args).await
    }

    /// Delete every row matching `where`, returning them.
    pub async fn delete(&self, args: Args) -> MapperResult<Vec<Record>> {
        self.delete_on(self.conn.as_ref(), args).await
    }

    /// The `SELECT` statement `find` would run.
    pub fn find_query(&self, args: &Args) -> MapperResult<Sql> {
        if let Some(offset) = args.offset.filter(|o| *o < 0) {
            return Err(MapperError::InvalidOffset(offset));
        }
        let limit = self.limit.sanitize(args.limit)?;
        let projection = self.projection(args.fields.as_deref())?;
        let criteria = Criteria::compile(&self.naming, &self.model, &args.filter, &args.order_by)?;

        let mut sql = Sql::new("SELECT ");
        sql.push_ident_list(&projection)
            .push(" FROM ")
            .push_ident_ref(&self.model.table().ident()?)
            .push_where_and(criteria.predicates);
        if !criteria.order_by.is_empty() {
            sql.push(" ORDER BY ")
                .push_sql(Sql::join(criteria.order_by, ", "));
        }
        sql.push(" LIMIT ").push_bind(limit);
        if let Some(offset) = args.offset {
            sql.push(" OFFSET ").push_bind(offset);
        }
        Ok(sql)
    }

    /// The `SELECT COUNT(*)` statement `count` would run.
    pub fn count_query(&self, args: &Args) -> MapperResult<Sql> {
        let predicates = compile_where(&self.naming, &self.model, &args.filter)?;
        let mut sql = Sql::new("SELECT COUNT(*) AS total FROM ");
        sql.push_ident_ref(&self.model.table().ident()?)
            .push_where_and(predicates);
        Ok(sql)
    }

    fn projection(&self, fields: Option<&[String]>) -> MapperResult<Vec<Ident>> {
        self.naming
            .compute_fields(fields)
            .iter()
            .map(|name| Ident::column(name))
            .collect()
    }

    fn stamped_field(&self, column: &str) -> Option<&Field> {
        self.model.get(column).filter(|f| f.is_auto_timestamp())
    }

    fn inserted_at(&self) -> Option<&Field> {
        self.stamped_field(&self.timestamps.inserted_at)
    }

    fn updated_at(&self) -> Option<&Field> {
        self.stamped_field(&self.timestamps.updated_at)
    }

    fn generates_uuid(&self) -> bool {
        self.model.primary_key_field().is_some_and(Field::is_uuid)
    }

    async fn find_on<T: GenericClient>(&self, conn: &T, args: Args) -> MapperResult<Vec<Record>> {
        let sql = self.find_query(&args)?;
        let rows = self.dialect.query(conn, sql).await?;
        Ok(rows
            .into_iter()
            .map(|row| self.naming.fix_output(row))
            .collect())
    }

    async fn count_on<T: GenericClient>(&self, conn: &T, args: Args) -> MapperResult<i64> {
        let sql = self.count_query(&args)?;
        let rows = self.dialect.query(conn, sql).await?;
        let total = rows
            .first()
            .and_then(|row| row.get("total"))
            .ok_or_else(|| MapperError::decode("total", "COUNT(*) returned no row"))?;
        let count = match total {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        };
        count.ok_or_else(|| MapperError::decode("total", format!("not an integer: {total}")))
    }

    async fn save_on<T: GenericClient>(&self, conn: &T, args: Args) -> MapperResult<Record> {
        let input = args.input.ok_or(MapperError::InputRequired)?;
        let returning = self.projection(args.fields.as_deref())?;
        let mut row = self.naming.fix_input(input)?;
        let primary_key = self.naming.primary_key();

        let now = now();
        if let Some(field) = self.updated_at() {
            row.insert(field.name().to_string(), now.clone());
        }

        if let Some(key) = row.get(primary_key).filter(|v| !is_blank_key(v)).cloned() {
            let updated = self
                .dialect
                .update_one(conn, self.model.table(), &row, primary_key, &returning)
                .await?
                .ok_or_else(|| {
                    MapperError::not_found(format!(
                        "{} with {primary_key} = {key} not found",
                        self.name
                    ))
                })?;
            return Ok(self.naming.fix_output(updated));
        }

        row.shift_remove(primary_key);
        if let Some(field) = self.inserted_at() {
            row.insert(field.name().to_string(), now);
        }
        let inserted = self
            .dialect
            .insert_one(
                conn,
                self.model.table(),
                &row,
                primary_key,
                self.generates_uuid(),
                &returning,
            )
            .await?;
        Ok(self.naming.fix_output(inserted))
    }

    async fn insert_on<T: GenericClient>(&self, conn: &T, args: Args) -> MapperResult<Vec<Record>> {
        let inputs = args.inputs.ok_or(MapperError::InputRequired)?;
        let returning = self.projection(args.fields.as_deref())?;
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let now = now();
        let stamps: Vec<&Field> = [self.inserted_at(), self.updated_at()]
            .into_iter()
            .flatten()
            .collect();
        let inputs: Vec<Record> = inputs
            .into_iter()
            .map(|mut input| {
                for field in &stamps {
                    input.shift_remove(field.name());
                    input.insert(field.external_name().to_string(), now.clone());
                }
                input
            })
            .collect();

        let table = self.model.table();
        let rows = if self.dialect.capabilities().batch_insert {
            self.dialect
                .insert_many(conn, table, inputs, &self.naming, &self.model, &returning)
                .await?
        } else {
            let primary_key = self.naming.primary_key();
            let translated = inputs
                .into_iter()
                .map(|input| {
                    let mut row = self.naming.fix_input(input)?;
                    if row.get(primary_key).is_some_and(is_blank_key) {
                        row.shift_remove(primary_key);
                    }
                    Ok(row)
                })
                .collect::<MapperResult<Vec<_>>>()?;

            let generate_uuid = self.generates_uuid();
            let mut rows = Vec::with_capacity(translated.len());
            for row in &translated {
                rows.push(
                    self.dialect
                        .insert_one(conn, table, row, primary_key, generate_uuid, &returning)
                        .await?,
                );
            }
            rows
        };

        Ok(rows
            .into_iter()
            .map(|row| self.naming.fix_output(row))
            .collect())
    }

    async fn update_many_on<T: GenericClient>(
        &self,
        conn: &T,
        args: Args,
    ) -> MapperResult<Vec<Record>> {
        let input = args.input.ok_or(MapperError::InputRequired)?;
        let returning = self.projection(args.fields.as_deref())?;
        let mut row = self.naming.fix_input(input)?;
        if let Some(field) = self.updated_at() {
            row.insert(field.name().to_string(), now());
        }
        if row.is_empty() {
            return Err(MapperError::validation("nothing to update"));
        }
        let criteria = compile_where(&self.naming, &self.model, &args.filter)?;

        let rows = self
            .dialect
            .update_many(conn, self.model.table(), criteria, &row, &returning)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| self.naming.fix_output(row))
            .collect())
    }

    async fn delete_on<T: GenericClient>(&self, conn: &T, args: Args) -> MapperResult<Vec<Record>> {
        let returning = self.projection(args.fields.as_deref())?;
        let criteria = compile_where(&self.naming, &self.model, &args.filter)?;

        let rows = self
            .dialect
            .delete_all(conn, self.model.table(), criteria, &returning)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| self.naming.fix_output(row))
            .collect())
    }
}

/// An [`Entity`] bound to a caller-supplied connection or transaction.
pub struct EntityTx<'a, C, D, T> {
    entity: &'a Entity<C, D>,
    conn: &'a T,
}

impl<C: GenericClient, D: Dialect, T: GenericClient> EntityTx<'_, C, D, T> {
    pub async fn find(&self, args: Args) -> MapperResult<Vec<Record>> {
        self.entity.find_on(self.conn, args).await
    }

    pub async fn count(&self, args: Args) -> MapperResult<i64> {
        self.entity.count_on(self.conn, args).await
    }

    pub async fn save(&self, args: Args) -> MapperResult<Record> {
        self.entity.save_on(self.conn, args).await
    }

    pub async fn insert(&self, args: Args) -> MapperResult<Vec<Record>> {
        self.entity.insert_on(self.conn, args).await
    }

    pub async fn update_many(&self, args: Args) -> MapperResult<Vec<Record>> {
        self.entity.update_many_on(self.conn, args).await
    }

    pub async fn delete(&self, args: Args) -> MapperResult<Vec<Record>> {
        self.entity.delete_on(self.conn, args).await
    }
}

fn now() -> Value {
    Value::String(format_timestamp(Utc::now()))
}

/// Name the entity is derived from. Tables are prefixed with their schema
/// when several schemas are mapped.
fn naming_base(table: &TableRef, config: &MapperConfig) -> String {
    match &table.schema {
        Some(schema) if config.schemas.len() > 1 => format!("{schema}_{}", table.name),
        _ => table.name.clone(),
    }
}
