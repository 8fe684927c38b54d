//! In-process store backend.
//!
//! Keeps entities in ordered maps behind a mutex, so listing and paging are
//! deterministic. Kinds and namespaces exist only while they hold at least one
//! entity, mirroring how the remote store behaves. Used by the `memory`
//! backend (seeded with random sample data) and as the test double for the
//! delete engine and the pipeline.

use super::{normalize_namespaces, Store};
use crate::error::{AppError, Result};
use crate::models::{Entity, EntityId, Key};
use async_trait::async_trait;
use rand::{thread_rng, Rng};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

type Properties = BTreeMap<String, Value>;
type KindMap = BTreeMap<EntityId, Properties>;

/// Number of calls made against a [`MemoryStore`], per operation.
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub keys_only: usize,
    pub fetch_all: usize,
    pub delete_multi: usize,
    pub put_multi: usize,
}

/// Ordered in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<(String, String), KindMap>>,
    keys_only_calls: AtomicUsize,
    fetch_all_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    put_calls: AtomicUsize,
    /// When set, the put call with this 1-based number fails.
    failing_put: Mutex<Option<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store populated with a few namespaces and kinds of random records.
    pub fn with_sample_data() -> Self {
        let store = Self::new();
        let mut rng = thread_rng();

        for namespace in ["", "staging", "tenant-acme"] {
            for kind in ["Customer", "Order", "Product"] {
                let count = rng.gen_range(20..=120);
                let entities: Vec<Entity> = (0..count)
                    .map(|i| {
                        // Mix numeric ids and string names like a real dataset would.
                        let id = if i % 3 == 0 {
                            EntityId::Name(format!("{}-{:04}", kind.to_lowercase(), i))
                        } else {
                            EntityId::Id(rng.gen_range(1_000..9_999_999))
                        };
                        sample_entity(Key::new(namespace, kind, id), &mut rng)
                    })
                    .collect();
                store.insert(entities);
            }
        }
        debug!("Seeded in-memory store with {} kinds", store.lock_data().len());
        store
    }

    /// Inserts entities synchronously; convenience for seeding.
    pub fn insert(&self, entities: impl IntoIterator<Item = Entity>) {
        let mut data = self.lock_data();
        for entity in entities {
            let Key { namespace, kind, id } = entity.key;
            data.entry((namespace, kind))
                .or_default()
                .insert(id, entity.properties);
        }
    }

    /// Number of entities currently stored for `kind`.
    #[cfg(test)]
    pub fn count(&self, namespace: &str, kind: &str) -> usize {
        self.lock_data()
            .get(&(namespace.to_string(), kind.to_string()))
            .map_or(0, BTreeMap::len)
    }

    #[cfg(test)]
    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            keys_only: self.keys_only_calls.load(Ordering::SeqCst),
            fetch_all: self.fetch_all_calls.load(Ordering::SeqCst),
            delete_multi: self.delete_calls.load(Ordering::SeqCst),
            put_multi: self.put_calls.load(Ordering::SeqCst),
        }
    }

    /// Makes the `call`-th put (1-based) fail with a store error.
    #[cfg(test)]
    pub fn fail_put_call(&self, call: usize) {
        *self
            .failing_put
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(call);
    }

    fn lock_data(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), KindMap>> {
        // A panicking test thread must not wedge every other caller.
        self.data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let namespaces: Vec<String> = self
            .lock_data()
            .keys()
            .map(|(namespace, _)| namespace.clone())
            .collect();
        Ok(normalize_namespaces(namespaces))
    }

    async fn list_kinds(&self, namespace: &str) -> Result<Vec<String>> {
        Ok(self
            .lock_data()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, kind)| kind.clone())
            .collect())
    }

    async fn keys_only(
        &self,
        namespace: &str,
        kind: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Key>> {
        self.keys_only_calls.fetch_add(1, Ordering::SeqCst);
        let data = self.lock_data();
        let Some(entities) = data.get(&(namespace.to_string(), kind.to_string())) else {
            return Ok(Vec::new());
        };
        Ok(entities
            .keys()
            .take(limit.unwrap_or(usize::MAX))
            .map(|id| Key::new(namespace, kind, id.clone()))
            .collect())
    }

    async fn fetch_all(&self, namespace: &str, kind: &str) -> Result<Vec<Entity>> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
        let data = self.lock_data();
        let Some(entities) = data.get(&(namespace.to_string(), kind.to_string())) else {
            return Ok(Vec::new());
        };
        Ok(entities
            .iter()
            .map(|(id, properties)| Entity {
                key: Key::new(namespace, kind, id.clone()),
                properties: properties.clone(),
            })
            .collect())
    }

    async fn delete_multi(&self, keys: &[Key]) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut data = self.lock_data();
        for key in keys {
            let slot = (key.namespace.clone(), key.kind.clone());
            if let Some(entities) = data.get_mut(&slot) {
                entities.remove(&key.id);
                if entities.is_empty() {
                    data.remove(&slot);
                }
            }
        }
        Ok(())
    }

    async fn put_multi(&self, entities: &[Entity]) -> Result<()> {
        let call = self.put_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failing = *self
            .failing_put
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if failing == Some(call) {
            return Err(AppError::Store(format!("injected failure on put #{}", call)));
        }
        self.insert(entities.iter().cloned());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Generates a plausible sample record for `key`.
fn sample_entity(key: Key, rng: &mut impl Rng) -> Entity {
    const CITIES: [&str; 5] = ["Lisbon", "Oslo", "Lagos", "Osaka", "Quito"];
    let kind = key.kind.clone();
    let entity = Entity::new(key);
    match kind.as_str() {
        "Customer" => entity
            .with_property("name", format!("Customer {}", rng.gen_range(1..500)))
            .with_property("city", CITIES[rng.gen_range(0..CITIES.len())])
            .with_property("active", rng.gen_bool(0.8)),
        "Order" => {
            let order = entity
                .with_property("total", rng.gen_range(5.0..900.0_f64).round())
                .with_property("items", rng.gen_range(1..12));
            // Not every order has a coupon, so exports get sparse columns.
            if rng.gen_bool(0.3) {
                order.with_property("coupon", format!("SAVE{}", rng.gen_range(5..50)))
            } else {
                order
            }
        },
        _ => entity
            .with_property("sku", format!("SKU-{:05}", rng.gen_range(0..99_999)))
            .with_property("price", rng.gen_range(1..400))
            .with_property("stock", rng.gen_range(0..1_000)),
    }
}
