//! Store client abstraction and its backends.
//!
//! Includes:
//! - `postgres`: entities persisted in a PostgreSQL table via `sqlx`.
//! - `memory`: an in-process store used for demos and tests.
//! - `retry`: bounded reconnection.

mod memory;
mod postgres;
mod retry;

pub use memory::*;
pub use postgres::*;
pub use retry::*;

use crate::config::{BackendKind, StoreConfig};
use crate::error::Result;
use crate::models::{Entity, Key};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Operations the manager needs from a hierarchical key/value store.
///
/// Every method is a suspension point; implementations must be safe to call
/// from several pipeline workers at once.
#[async_trait]
pub trait Store: Send + Sync {
    /// All namespaces, default namespace (`""`) first, then alphabetical.
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// All kinds in `namespace`, sorted.
    async fn list_kinds(&self, namespace: &str) -> Result<Vec<String>>;

    /// Identifiers of up to `limit` entities of `kind` (all when `None`).
    async fn keys_only(&self, namespace: &str, kind: &str, limit: Option<usize>)
        -> Result<Vec<Key>>;

    /// Every entity of `kind`, with properties.
    async fn fetch_all(&self, namespace: &str, kind: &str) -> Result<Vec<Entity>>;

    /// Deletes the given keys in one call. Missing keys are ignored.
    async fn delete_multi(&self, keys: &[Key]) -> Result<()>;

    /// Inserts or fully overwrites the given entities in one call.
    async fn put_multi(&self, entities: &[Entity]) -> Result<()>;

    /// Cheap round trip used to validate a connection.
    async fn ping(&self) -> Result<()>;
}

/// Shared handle used by menus and pipeline workers.
pub type SharedStore = Arc<dyn Store>;

/// Builds the backend described by `config`.
pub async fn connect(config: &StoreConfig) -> Result<SharedStore> {
    match config.backend {
        BackendKind::Postgres => {
            let store = PostgresStore::connect(config).await?;
            store.init_schema().await?;
            Ok(Arc::new(store))
        },
        BackendKind::Memory => Ok(Arc::new(MemoryStore::with_sample_data())),
    }
}

/// Connects and checks the connection with a round trip.
pub async fn connect_checked(config: &StoreConfig) -> Result<SharedStore> {
    let store = connect(config).await?;
    store.ping().await?;
    Ok(store)
}

/// Creates the backing schema without keeping a client around.
///
/// The in-memory backend has no schema, so this is a no-op for it.
pub async fn init_schema(config: &StoreConfig) -> Result<()> {
    match config.backend {
        BackendKind::Postgres => PostgresStore::connect(config).await?.init_schema().await,
        BackendKind::Memory => {
            info!("The memory backend has no schema to initialize");
            Ok(())
        },
    }
}

/// Sorts namespaces with the default namespace first and makes sure it is present.
pub(crate) fn normalize_namespaces(mut namespaces: Vec<String>) -> Vec<String> {
    if !namespaces.iter().any(String::is_empty) {
        namespaces.push(String::new());
    }
    namespaces.sort_by(|a, b| (!a.is_empty(), a).cmp(&(!b.is_empty(), b)));
    namespaces.dedup();
    namespaces
}
