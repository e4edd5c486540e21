//! # pgmapper
//!
//! Runtime entity mapping for PostgreSQL.
//!
//! pgmapper reads a table's columns, enum labels and constraints from the live
//! database and builds an [`Entity`] offering `find`, `count`, `save`,
//! `insert`, `update_many` and `delete` over it. Rows go in and out as JSON
//! [`Record`]s keyed by lowerCamelCase field names, while statements use the
//! snake_case column names.
//!
//! ## Features
//!
//! - **Introspection**: fields, primary key, foreign keys and enum labels come
//!   from the catalog, nothing is declared in code
//! - **Parameterized SQL**: caller values are always bound; identifiers are
//!   quoted; operators come from a closed set
//! - **Filters**: `eq`, `neq`, `gt`, `gte`, `lt`, `lte`, `in`, `nin`, `like`,
//!   with `eq null` / `neq null` compiled to `IS [NOT] NULL`
//! - **Timestamps**: `inserted_at` / `updated_at` stamped automatically
//! - **Transaction-friendly**: `entity.tx(&tx)` runs any operation on a
//!   caller-owned transaction
//! - **Adapters**: engine specifics live behind the [`Dialect`] trait and are
//!   described by [`Capabilities`]
//!
//! ## Example
//!
//! ```ignore
//! use pgmapper::{Args, Database, MapperConfig, Postgres, record};
//! use serde_json::json;
//!
//! let db = Database::connect(client, Postgres::new(), &MapperConfig::default()).await?;
//! let pages = db.entity("page").expect("pages table");
//!
//! let page = pages.save(Args::new().input(record(json!({ "title": "Hello" }))?)).await?;
//!
//! let hits = pages
//!     .find(Args::from_json(json!({ "where": { "title": { "like": "%ell%" } } }))?)
//!     .await?;
//! ```
//!
//! Executed statements are logged with `tracing` at debug level on the
//! `pgmapper.sql` target.

pub mod client;
pub mod config;
pub mod criteria;
pub mod database;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod ident;
pub mod inflect;
pub mod model;
pub mod naming;
pub mod row;
pub mod sql;
pub mod value;

#[cfg(test)]
mod mock;

pub use client::GenericClient;
pub use config::{AutoTimestamp, LimitConfig, MapperConfig};
pub use criteria::{Criteria, Direction, Operator, OrderBy, Predicate, Where};
pub use database::Database;
pub use dialect::{
    Capabilities, ColumnRow, ConstraintKind, ConstraintRow, Dialect, EnumRow, Postgres, TableRef,
};
pub use entity::{Args, Entity, EntityTx};
pub use error::{MapperError, MapperResult};
pub use ident::Ident;
pub use model::{Field, FieldBuilder, FieldModel, Relation, load_field_model};
pub use naming::NameTranslator;
pub use row::RowExt;
pub use sql::{Sql, TrustedLiteral};
pub use value::{DynValue, JsonParam, Record, record};
