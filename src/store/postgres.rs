//! PostgreSQL store backend using `sqlx`.
//!
//! Every entity is one row of the `entities` table keyed by
//! `(namespace, kind, key_type, key_value)`, with its properties in a JSONB
//! column. Namespaces and kinds are derived from the rows, so they vanish when
//! their last entity is deleted. Also contains integration tests (requires the
//! `integration-tests` feature).

use super::{normalize_namespaces, Store};
use crate::config::StoreConfig;
use crate::error::{AppError, Result};
use crate::models::{Entity, EntityId, Key};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Entity store backed by a PostgreSQL connection pool.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Opens a connection pool for the database named in `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when no database URL is configured and
    /// `AppError::Db` if the pool cannot be established.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            AppError::Config("DATABASE_URL is required for the postgres backend".to_string())
        })?;
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(|e| {
                error!("Failed to connect to database: {}", e);
                AppError::Db(e.into())
            })?;

        info!("Connected to database successfully");
        Ok(Self { pool })
    }

    /// Creates the `entities` table and its lookup index if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any statement fails.
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema (if necessary)...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                namespace TEXT NOT NULL,
                kind TEXT NOT NULL,
                key_type TEXT NOT NULL CHECK (key_type IN ('id', 'name')),
                key_value TEXT NOT NULL,
                properties JSONB NOT NULL DEFAULT '{}'::jsonb,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (namespace, kind, key_type, key_value)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create entities table: {}", e);
            AppError::Db(e.into())
        })?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_entities_namespace_kind ON entities(namespace, kind)"#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create namespace/kind index: {}", e);
            AppError::Db(e.into())
        })?;

        info!("Database schema initialized successfully");
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let namespaces =
            sqlx::query_scalar::<_, String>("SELECT DISTINCT namespace FROM entities")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    error!("Failed to list namespaces: {}", e);
                    AppError::Db(e.into())
                })?;
        debug!("Found {} namespace(s)", namespaces.len());
        Ok(normalize_namespaces(namespaces))
    }

    async fn list_kinds(&self, namespace: &str) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT kind FROM entities WHERE namespace = $1 ORDER BY kind",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list kinds in namespace '{}': {}", namespace, e);
            AppError::Db(e.into())
        })
    }

    async fn keys_only(
        &self,
        namespace: &str,
        kind: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Key>> {
        // LIMIT NULL is LIMIT ALL in PostgreSQL.
        let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));
        let rows = sqlx::query(
            r#"
            SELECT key_type, key_value FROM entities
            WHERE namespace = $1 AND kind = $2
            ORDER BY key_type, key_value
            LIMIT $3
            "#,
        )
        .bind(namespace)
        .bind(kind)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Keys-only query for kind {} failed: {}", kind, e);
            AppError::Db(e.into())
        })?;

        rows.iter()
            .map(|row| Ok(Key::new(namespace, kind, decode_id(row)?)))
            .collect()
    }

    async fn fetch_all(&self, namespace: &str, kind: &str) -> Result<Vec<Entity>> {
        let rows = sqlx::query(
            r#"
            SELECT key_type, key_value, properties FROM entities
            WHERE namespace = $1 AND kind = $2
            ORDER BY key_type, key_value
            "#,
        )
        .bind(namespace)
        .bind(kind)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch entities of kind {}: {}", kind, e);
            AppError::Db(e.into())
        })?;
        debug!("Fetched {} entities of kind {}", rows.len(), kind);

        rows.iter()
            .map(|row| {
                let Json(properties) = row
                    .try_get::<Json<BTreeMap<String, Value>>, _>("properties")
                    .map_err(AppError::from)?;
                Ok(Entity {
                    key: Key::new(namespace, kind, decode_id(row)?),
                    properties,
                })
            })
            .collect()
    }

    async fn delete_multi(&self, keys: &[Key]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin database transaction: {}", e);
            AppError::Db(e.into())
        })?;

        for key in keys {
            sqlx::query(
                r#"
                DELETE FROM entities
                WHERE namespace = $1 AND kind = $2 AND key_type = $3 AND key_value = $4
                "#,
            )
            .bind(&key.namespace)
            .bind(&key.kind)
            .bind(key.id.tag())
            .bind(key.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to delete entity {}: {}", key.id, e);
                AppError::Db(e.into())
            })?;
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit database transaction: {}", e);
            AppError::Db(e.into())
        })?;
        debug!("Deleted {} entities", keys.len());
        Ok(())
    }

    async fn put_multi(&self, entities: &[Entity]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin database transaction: {}", e);
            AppError::Db(e.into())
        })?;

        for entity in entities {
            sqlx::query(
                r#"
                INSERT INTO entities (namespace, kind, key_type, key_value, properties)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (namespace, kind, key_type, key_value)
                DO UPDATE SET properties = EXCLUDED.properties, updated_at = NOW()
                "#,
            )
            .bind(&entity.key.namespace)
            .bind(&entity.key.kind)
            .bind(entity.key.id.tag())
            .bind(entity.key.id.to_string())
            .bind(Json(&entity.properties))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to upsert entity {}: {}", entity.key.id, e);
                AppError::Db(e.into())
            })?;
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit database transaction: {}", e);
            AppError::Db(e.into())
        })?;
        debug!("Upserted {} entities", entities.len());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Database ping failed: {}", e);
                AppError::Db(e.into())
            })?;
        Ok(())
    }
}

/// Rebuilds the local identifier from a `(key_type, key_value)` row.
fn decode_id(row: &PgRow) -> Result<EntityId> {
    let key_type: String = row.try_get("key_type")?;
    let key_value: String = row.try_get("key_value")?;
    match key_type.as_str() {
        "id" => key_value.parse::<i64>().map(EntityId::Id).map_err(|e| {
            AppError::Store(format!("corrupt numeric key '{}': {}", key_value, e))
        }),
        _ => Ok(EntityId::Name(key_value)),
    }
}

// --- Integration Tests ---
// These tests interact with a real PostgreSQL database.
// Run using: `cargo test --features integration-tests`
// Requires a running PostgreSQL instance configured via DATABASE_URL env var.
#[cfg(test)]
#[cfg(feature = "integration-tests")]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::PgPool;

    async fn seeded(pool: PgPool) -> Result<PostgresStore> {
        let store = PostgresStore { pool };
        store.init_schema().await?;
        store
            .put_multi(&[
                Entity::new(Key::new("", "Task", EntityId::Id(1))).with_property("title", "a"),
                Entity::new(Key::new("", "Task", EntityId::Name("t-2".into())))
                    .with_property("title", "b"),
                Entity::new(Key::new("team", "Member", EntityId::Id(10)))
                    .with_property("name", "Ana"),
            ])
            .await?;
        Ok(store)
    }

    #[sqlx::test]
    async fn test_init_schema_is_idempotent(pool: PgPool) -> Result<()> {
        let store = PostgresStore { pool };
        store.init_schema().await?;
        store.init_schema().await?;

        let table_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_schema = 'public' AND table_name = 'entities')",
        )
        .fetch_one(&store.pool)
        .await?;
        assert!(table_exists, "entities table should exist after init_schema");
        Ok(())
    }

    #[sqlx::test]
    async fn test_listing_namespaces_and_kinds(pool: PgPool) -> Result<()> {
        let store = seeded(pool).await?;
        assert_eq!(store.list_namespaces().await?, vec!["", "team"]);
        assert_eq!(store.list_kinds("").await?, vec!["Task"]);
        assert_eq!(store.list_kinds("team").await?, vec!["Member"]);
        Ok(())
    }

    #[sqlx::test]
    async fn test_key_types_round_trip(pool: PgPool) -> Result<()> {
        let store = seeded(pool).await?;
        let mut keys = store.keys_only("", "Task", None).await?;
        keys.sort();
        assert_eq!(keys[0].id, EntityId::Id(1));
        assert_eq!(keys[1].id, EntityId::Name("t-2".into()));
        assert_eq!(store.keys_only("", "Task", Some(1)).await?.len(), 1);
        Ok(())
    }

    #[sqlx::test]
    async fn test_put_overwrites_and_delete_removes(pool: PgPool) -> Result<()> {
        let store = seeded(pool).await?;
        let key = Key::new("", "Task", EntityId::Id(1));
        store
            .put_multi(&[Entity::new(key.clone()).with_property("done", true)])
            .await?;

        let tasks = store.fetch_all("", "Task").await?;
        let task = tasks.iter().find(|e| e.key == key).expect("task 1 present");
        assert_eq!(task.properties.len(), 1);
        assert_eq!(task.properties["done"], json!(true));

        let keys = store.keys_only("", "Task", None).await?;
        store.delete_multi(&keys).await?;
        assert!(store.list_kinds("").await?.is_empty());
        Ok(())
    }
}
