//! Field model: the introspected shape of one table.
//!
//! [`load_field_model`] merges the column, enum and constraint listings of a
//! [`Dialect`] into a [`FieldModel`]. Fields are assembled with
//! [`FieldBuilder`]s and frozen once every listing has been applied.

use crate::client::GenericClient;
use crate::config::AutoTimestamp;
use crate::dialect::{ColumnRow, ConstraintKind, ConstraintRow, Dialect, TableRef};
use crate::error::{MapperError, MapperResult};
use crate::naming::external_name;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Primary key types accepted by adapters without typed primary keys.
const UNTYPED_PRIMARY_KEY_TYPES: &[&str] = &["integer", "uuid", "serial"];

const TEXT_TYPES: &[&str] = &["text", "varchar", "bpchar", "citext", "name"];

const FIXED_NUMERIC_TYPES: &[&str] = &["int2", "int4", "int8", "float4", "float8"];

/// One column of an entity. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    name: String,
    external_name: String,
    sql_type: String,
    nullable: bool,
    enum_values: Option<Vec<String>>,
    primary_key: bool,
    foreign_key: bool,
    auto_timestamp: bool,
}

impl Field {
    /// Storage (column) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// lowerCamelCase name used in inputs and outputs.
    pub fn external_name(&self) -> &str {
        &self.external_name
    }

    /// Type name as reported by the adapter (`int4`, `varchar`, an enum type...).
    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn enum_values(&self) -> Option<&[String]> {
        self.enum_values.as_deref()
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_foreign_key(&self) -> bool {
        self.foreign_key
    }

    pub fn is_auto_timestamp(&self) -> bool {
        self.auto_timestamp
    }

    pub fn is_uuid(&self) -> bool {
        self.sql_type.eq_ignore_ascii_case("uuid")
    }

    /// Text-like types compared with `LIKE` without a cast.
    pub fn is_text(&self) -> bool {
        TEXT_TYPES
            .iter()
            .any(|t| self.sql_type.eq_ignore_ascii_case(t))
    }

    /// Fixed-width numeric types whose filter values are coerced to numbers.
    pub fn is_fixed_numeric(&self) -> bool {
        FIXED_NUMERIC_TYPES
            .iter()
            .any(|t| self.sql_type.eq_ignore_ascii_case(t))
    }
}

/// Mutable field under construction.
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    name: String,
    sql_type: String,
    nullable: bool,
    enum_values: Option<Vec<String>>,
    primary_key: bool,
    foreign_key: bool,
    auto_timestamp: bool,
}

impl FieldBuilder {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            enum_values: None,
            primary_key: false,
            foreign_key: false,
            auto_timestamp: false,
        }
    }

    /// Start from an introspected column, keeping any inline enum labels.
    pub fn from_column(column: ColumnRow) -> Self {
        let mut builder = Self::new(column.name, column.sql_type).nullable(column.nullable);
        builder.enum_values = column.enum_labels;
        builder
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn auto_timestamp(mut self, auto_timestamp: bool) -> Self {
        self.auto_timestamp = auto_timestamp;
        self
    }

    pub fn enum_values<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn foreign_key(mut self) -> Self {
        self.foreign_key = true;
        self
    }

    /// Append one enum label.
    pub fn push_enum_label(&mut self, label: impl Into<String>) {
        self.enum_values.get_or_insert_with(Vec::new).push(label.into());
    }

    pub fn mark_primary_key(&mut self) {
        self.primary_key = true;
    }

    pub fn mark_foreign_key(&mut self) {
        self.foreign_key = true;
    }

    pub fn build(self) -> Field {
        Field {
            external_name: external_name(&self.name),
            name: self.name,
            sql_type: self.sql_type,
            nullable: self.nullable,
            enum_values: self.enum_values,
            primary_key: self.primary_key,
            foreign_key: self.foreign_key,
            auto_timestamp: self.auto_timestamp,
        }
    }
}

/// A foreign key of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub constraint_name: String,
    /// Referencing column of this table.
    pub column_name: String,
    pub foreign_table_schema: Option<String>,
    pub foreign_table: String,
    pub foreign_column: String,
}

impl Relation {
    fn from_constraint(row: ConstraintRow) -> Option<Self> {
        Some(Self {
            constraint_name: row.constraint_name,
            column_name: row.column_name,
            foreign_table_schema: row.foreign_table_schema,
            foreign_table: row.foreign_table?,
            foreign_column: row.foreign_column?,
        })
    }
}

/// The fields, primary key and relations of one table.
#[derive(Debug, Clone)]
pub struct FieldModel {
    table: TableRef,
    fields: Vec<Field>,
    index: HashMap<String, usize>,
    primary_key: Option<String>,
    relations: Vec<Relation>,
}

impl FieldModel {
    /// Freeze builders into a model. The primary key is the first builder
    /// flagged as one.
    pub fn new(table: TableRef, builders: Vec<FieldBuilder>, relations: Vec<Relation>) -> Self {
        let fields: Vec<Field> = builders.into_iter().map(FieldBuilder::build).collect();
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        let primary_key = fields
            .iter()
            .find(|f| f.primary_key)
            .map(|f| f.name.clone());
        Self {
            table,
            fields,
            index,
            primary_key,
            relations,
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Fields in column order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look a field up by storage name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Storage name of the primary key, if the table has one.
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn primary_key_field(&self) -> Option<&Field> {
        self.primary_key.as_deref().and_then(|pk| self.get(pk))
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }
}

/// Introspect `table` through `dialect` and build its field model.
///
/// Columns listed in `ignore` are left out; constraints and enum labels that
/// refer to them are skipped silently, those that refer to columns the adapter
/// never listed are skipped with a warning.
pub async fn load_field_model<C, D>(
    conn: &C,
    dialect: &D,
    table: &TableRef,
    ignore: &HashSet<String>,
    timestamps: &AutoTimestamp,
) -> MapperResult<FieldModel>
where
    C: GenericClient,
    D: Dialect,
{
    let caps = dialect.capabilities();

    let mut builders: Vec<FieldBuilder> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for mut column in dialect.list_columns(conn, table).await? {
        if ignore.contains(&column.name) {
            continue;
        }
        if !caps.inline_enum_labels {
            column.enum_labels = None;
        }
        let auto = timestamps.applies_to(&column.name);
        let builder = FieldBuilder::from_column(column).auto_timestamp(auto);
        index.insert(builder.name().to_string(), builders.len());
        builders.push(builder);
    }

    if caps.enum_listing {
        for row in dialect.list_enum_values(conn, table).await? {
            match index.get(&row.column_name) {
                Some(&i) => builders[i].push_enum_label(row.label),
                None => debug!(
                    table = %table,
                    column = %row.column_name,
                    "enum label for unmapped column skipped"
                ),
            }
        }
    }

    let mut primary_key: Option<String> = None;
    let mut relations = Vec::new();
    for constraint in dialect.list_constraints(conn, table).await? {
        let Some(&i) = index.get(&constraint.column_name) else {
            if !ignore.contains(&constraint.column_name) {
                warn!(
                    table = %table,
                    column = %constraint.column_name,
                    constraint = %constraint.constraint_name,
                    "MissingFieldForConstraint: constraint refers to an unknown column"
                );
            }
            continue;
        };

        match constraint.kind {
            ConstraintKind::PrimaryKey => {
                let builder = &mut builders[i];
                if !caps.typed_primary_keys {
                    let sql_type = builder.sql_type();
                    if !UNTYPED_PRIMARY_KEY_TYPES
                        .iter()
                        .any(|t| sql_type.eq_ignore_ascii_case(t))
                    {
                        return Err(MapperError::InvalidPrimaryKeyType(sql_type.to_string()));
                    }
                }
                builder.mark_primary_key();
                match &primary_key {
                    None => primary_key = Some(constraint.column_name.clone()),
                    Some(first) if *first != constraint.column_name => warn!(
                        table = %table,
                        primary_key = %first,
                        column = %constraint.column_name,
                        "composite primary key, using the first column"
                    ),
                    Some(_) => {}
                }
            }
            ConstraintKind::ForeignKey => {
                builders[i].mark_foreign_key();
                relations.extend(Relation::from_constraint(constraint));
            }
            ConstraintKind::Unique | ConstraintKind::Other => {}
        }
    }

    let mut model = FieldModel::new(table.clone(), builders, relations);
    // Constraint order decides between composite key columns.
    if primary_key.is_some() {
        model.primary_key = primary_key;
    }
    debug!(
        table = %table,
        fields = model.fields.len(),
        primary_key = ?model.primary_key,
        "field model loaded"
    );
    Ok(model)
}
