//! Mapper configuration.
//!
//! Every setting has a default, so `MapperConfig::default()` is a working
//! configuration. The struct also implements `serde::Deserialize`, letting an
//! application keep it in its own config file:
//!
//! ```ignore
//! let config: MapperConfig = serde_json::from_value(serde_json::json!({
//!     "schemas": ["public"],
//!     "autoTimestamp": { "enabled": true },
//!     "limit": { "default": 20, "max": 200 },
//!     "ignoreTables": ["schema_migrations"]
//! }))?;
//! ```

use crate::dialect::TableRef;
use crate::error::{MapperError, MapperResult};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Row limits applied to `find`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Limit used when the caller passes none.
    pub default: i64,
    /// Upper bound; larger requested limits are clamped to it.
    pub max: i64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            default: 10,
            max: 100,
        }
    }
}

impl LimitConfig {
    /// Create a limit configuration.
    pub fn new(default: i64, max: i64) -> Self {
        Self { default, max }
    }

    /// Resolve the limit for one call.
    ///
    /// - absent: `default` (itself capped at `max`)
    /// - negative: [`MapperError::InvalidLimit`]
    /// - above `max`: `max`
    pub fn sanitize(&self, requested: Option<i64>) -> MapperResult<i64> {
        let limit = requested.unwrap_or(self.default);
        if limit < 0 {
            return Err(MapperError::InvalidLimit(limit));
        }
        Ok(limit.min(self.max))
    }
}

/// Automatic insertion/update time stamping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoTimestamp {
    pub enabled: bool,
    /// Column stamped on insert.
    pub inserted_at: String,
    /// Column stamped on insert and on every update.
    pub updated_at: String,
}

impl Default for AutoTimestamp {
    fn default() -> Self {
        Self {
            enabled: true,
            inserted_at: "inserted_at".to_string(),
            updated_at: "updated_at".to_string(),
        }
    }
}

impl AutoTimestamp {
    /// Stamping turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Whether `column` is one of the stamped columns (and stamping is on).
    pub fn applies_to(&self, column: &str) -> bool {
        self.enabled && (column == self.inserted_at || column == self.updated_at)
    }
}

/// Configuration for building entities.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MapperConfig {
    /// Schemas scanned by [`Database::connect`](crate::Database::connect).
    pub schemas: Vec<String>,
    /// Automatic timestamp columns.
    pub auto_timestamp: AutoTimestamp,
    /// Row limits for `find`.
    pub limit: LimitConfig,
    /// Tables never turned into entities.
    pub ignore_tables: HashSet<String>,
    /// Columns left out of an entity, keyed by table name.
    pub ignore_columns: HashMap<String, HashSet<String>>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            schemas: vec!["public".to_string()],
            auto_timestamp: AutoTimestamp::default(),
            limit: LimitConfig::default(),
            ignore_tables: HashSet::new(),
            ignore_columns: HashMap::new(),
        }
    }
}

impl MapperConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the scanned schemas.
    pub fn schemas<I, S>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemas = schemas.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable automatic timestamps.
    pub fn auto_timestamp(mut self, enabled: bool) -> Self {
        self.auto_timestamp.enabled = enabled;
        self
    }

    /// Use custom timestamp column names.
    pub fn timestamp_columns(
        mut self,
        inserted_at: impl Into<String>,
        updated_at: impl Into<String>,
    ) -> Self {
        self.auto_timestamp.inserted_at = inserted_at.into();
        self.auto_timestamp.updated_at = updated_at.into();
        self
    }

    /// Set default and maximum `find` limits.
    pub fn limit(mut self, default: i64, max: i64) -> Self {
        self.limit = LimitConfig::new(default, max);
        self
    }

    /// Skip a table entirely. `pages` skips it in every schema,
    /// `archive.pages` only in `archive`.
    pub fn ignore_table(mut self, table: impl Into<String>) -> Self {
        self.ignore_tables.insert(table.into());
        self
    }

    /// Leave one column out of a table's entity.
    pub fn ignore_column(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.ignore_columns
            .entry(table.into())
            .or_default()
            .insert(column.into());
        self
    }

    pub fn is_table_ignored(&self, table: &TableRef) -> bool {
        self.ignore_tables.contains(&table.name)
            || (table.schema.is_some() && self.ignore_tables.contains(&table.to_string()))
    }

    /// Columns ignored for `table` (empty when none are configured).
    pub fn ignored_columns(&self, table: &str) -> HashSet<String> {
        self.ignore_columns.get(table).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        let limit = LimitConfig::default();
        assert_eq!(limit.sanitize(None).unwrap(), 10);
        assert_eq!(limit.sanitize(Some(5)).unwrap(), 5);
        assert_eq!(limit.sanitize(Some(1000)).unwrap(), 100);
        assert_eq!(limit.sanitize(Some(0)).unwrap(), 0);
    }

    #[test]
    fn negative_limit_is_rejected() {
        let err = LimitConfig::default().sanitize(Some(-1)).unwrap_err();
        assert!(matches!(err, MapperError::InvalidLimit(-1)));
    }

    #[test]
    fn default_above_max_is_capped() {
        assert_eq!(LimitConfig::new(50, 20).sanitize(None).unwrap(), 20);
    }

    #[test]
    fn timestamps_only_apply_when_enabled() {
        let ts = AutoTimestamp::default();
        assert!(ts.applies_to("updated_at"));
        assert!(ts.applies_to("inserted_at"));
        assert!(!ts.applies_to("created_at"));
        assert!(!AutoTimestamp::disabled().applies_to("updated_at"));
    }

    #[test]
    fn builder_collects_ignores() {
        let config = MapperConfig::new()
            .ignore_table("schema_migrations")
            .ignore_column("pages", "secret")
            .ignore_column("pages", "draft");
        assert!(config.is_table_ignored(&TableRef::new("schema_migrations")));
        assert!(config.is_table_ignored(&TableRef::with_schema("audit", "schema_migrations")));
        assert_eq!(config.ignored_columns("pages").len(), 2);
        assert!(config.ignored_columns("users").is_empty());
    }

    #[test]
    fn qualified_ignores_match_one_schema() {
        let config = MapperConfig::new().ignore_table("archive.pages");
        assert!(config.is_table_ignored(&TableRef::with_schema("archive", "pages")));
        assert!(!config.is_table_ignored(&TableRef::with_schema("public", "pages")));
        assert!(!config.is_table_ignored(&TableRef::new("pages")));
    }

    #[test]
    fn deserializes_with_partial_input() {
        let config: MapperConfig = serde_json::from_value(serde_json::json!({
            "autoTimestamp": { "enabled": false },
            "limit": { "max": 500 },
            "ignoreColumns": { "pages": ["secret"] }
        }))
        .unwrap();
        assert_eq!(config.schemas, vec!["public".to_string()]);
        assert!(!config.auto_timestamp.enabled);
        assert_eq!(config.auto_timestamp.updated_at, "updated_at");
        assert_eq!(config.limit, LimitConfig::new(10, 500));
        assert!(config.ignored_columns("pages").contains("secret"));
    }
}
