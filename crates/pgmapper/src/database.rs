//! Entities for every table of a database.

use crate::client::GenericClient;
use crate::config::MapperConfig;
use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::{MapperError, MapperResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One [`Entity`] per mapped table, keyed by singular entity name.
///
/// ```ignore
/// let client = /* tokio_postgres::Client */;
/// let db = Database::connect(client, Postgres::new(), &MapperConfig::default()).await?;
/// let pages = db.entity("page").expect("pages table");
/// ```
pub struct Database<C, D> {
    entities: BTreeMap<String, Entity<C, D>>,
    conn: Arc<C>,
    dialect: Arc<D>,
}

impl<C: GenericClient, D: Dialect> Database<C, D> {
    /// Introspect the configured schemas and build an entity per table.
    pub async fn connect(conn: C, dialect: D, config: &MapperConfig) -> MapperResult<Self> {
        Self::connect_shared(Arc::new(conn), Arc::new(dialect), config).await
    }

    /// Like [`Database::connect`], for handles that are already shared.
    ///
    /// Ignored tables and tables without a primary key are skipped. Two tables
    /// that produce the same entity name fail with
    /// [`MapperError::NameCollision`].
    pub async fn connect_shared(
        conn: Arc<C>,
        dialect: Arc<D>,
        config: &MapperConfig,
    ) -> MapperResult<Self> {
        let tables = dialect.list_tables(conn.as_ref(), &config.schemas).await?;

        let mut entities: BTreeMap<String, Entity<C, D>> = BTreeMap::new();
        for table in tables {
            if config.is_table_ignored(&table) {
                debug!(table = %table, "ignored table skipped");
                continue;
            }

            let entity =
                match Entity::build(Arc::clone(&conn), Arc::clone(&dialect), table.clone(), config)
                    .await
                {
                    Ok(entity) => entity,
                    Err(MapperError::MissingPrimaryKey(_)) => {
                        warn!(table = %table, "table has no primary key, skipped");
                        continue;
                    }
                    Err(e) => return Err(e),
                };

            let key = entity.singular_name().to_string();
            if let Some(existing) = entities.get(&key) {
                return Err(MapperError::NameCollision {
                    external: key,
                    first: existing.table().to_string(),
                    second: table.to_string(),
                });
            }
            entities.insert(key, entity);
        }

        debug!(entities = entities.len(), "database mapped");
        Ok(Self {
            entities,
            conn,
            dialect,
        })
    }
}

impl<C, D> Database<C, D> {
    /// Entity by singular name (`page` for `pages`).
    pub fn entity(&self, name: &str) -> Option<&Entity<C, D>> {
        self.entities.get(name)
    }

    /// All entities, ordered by name.
    pub fn entities(&self) -> impl Iterator<Item = (&str, &Entity<C, D>)> {
        self.entities.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }
}
