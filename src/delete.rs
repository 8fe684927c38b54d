//! Paginated bulk deletion.
//!
//! Deleting a kind repeats "fetch a page of keys, delete exactly those keys"
//! until a fetch comes back empty. Deleting a namespace runs that loop for each
//! of its kinds, one kind at a time.

use crate::error::Result;
use crate::models::display_namespace;
use crate::store::SharedStore;
use tracing::{debug, info};

/// Deletes entities page by page through a [`SharedStore`].
pub struct DeleteEngine {
    store: SharedStore,
    page_size: usize,
}

impl DeleteEngine {
    /// A `page_size` of zero is treated as one.
    pub fn new(store: SharedStore, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    /// Removes every entity of `kind` in `namespace` and returns how many were deleted.
    ///
    /// Performs `ceil(N / page_size)` fetch/delete rounds plus one final empty
    /// fetch for `N` entities.
    ///
    /// # Errors
    ///
    /// The first failing store call aborts the loop; entities deleted in
    /// earlier rounds stay deleted.
    pub async fn delete_all_of_kind(&self, namespace: &str, kind: &str) -> Result<usize> {
        let mut total = 0;
        let mut round = 0;
        loop {
            let keys = self
                .store
                .keys_only(namespace, kind, Some(self.page_size))
                .await?;
            if keys.is_empty() {
                break;
            }
            round += 1;
            self.store.delete_multi(&keys).await?;
            total += keys.len();
            debug!(
                "Round {}: deleted {} key(s) of kind {} ({} so far)",
                round,
                keys.len(),
                kind,
                total
            );
        }

        info!(
            "Removed {} entities for [namespace={}] kind {}",
            total,
            display_namespace(namespace),
            kind
        );
        Ok(total)
    }

    /// Removes every kind in `namespace`, sequentially, and returns the total deleted.
    ///
    /// # Errors
    ///
    /// Stops at the first kind whose deletion fails.
    pub async fn delete_namespace(&self, namespace: &str) -> Result<usize> {
        let kinds = self.store.list_kinds(namespace).await?;
        info!(
            "Removing namespace {} ({} kind(s))",
            display_namespace(namespace),
            kinds.len()
        );

        let mut total = 0;
        for kind in &kinds {
            total += self.delete_all_of_kind(namespace, kind).await?;
        }

        info!(
            "Removed namespace {}. Total entities deleted: {}",
            display_namespace(namespace),
            total
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DELETE_PAGE;
    use crate::models::{Entity, EntityId, Key};
    use crate::store::{MemoryStore, Store};
    use rstest::rstest;
    use std::sync::Arc;

    fn seeded(counts: &[(&str, &str, i64)]) -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        for &(namespace, kind, n) in counts {
            store.insert((0..n).map(|i| {
                Entity::new(Key::new(namespace, kind, EntityId::Id(i))).with_property("i", i)
            }));
        }
        Arc::new(store)
    }

    #[rstest]
    #[case(0, 500)]
    #[case(1, 500)]
    #[case(500, 500)]
    #[case(1234, 500)]
    #[case(10, 3)]
    #[case(7, 1)]
    #[tokio::test]
    async fn test_rounds_and_count(#[case] n: i64, #[case] page: usize) {
        let memory = seeded(&[("", "Log", n)]);
        let engine = DeleteEngine::new(memory.clone(), page);

        let deleted = engine.delete_all_of_kind("", "Log").await.unwrap();

        let rounds = (n as usize).div_ceil(page);
        assert_eq!(deleted, n as usize);
        assert_eq!(memory.call_counts().delete_multi, rounds);
        assert_eq!(memory.call_counts().keys_only, rounds + 1);
        assert_eq!(memory.count("", "Log"), 0);

        assert_eq!(engine.delete_all_of_kind("", "Log").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_other_kinds_and_namespaces_untouched() {
        let memory = seeded(&[("", "Log", 20), ("", "User", 5), ("other", "Log", 4)]);
        let engine = DeleteEngine::new(memory.clone(), 6);

        assert_eq!(engine.delete_all_of_kind("", "Log").await.unwrap(), 20);
        assert_eq!(memory.count("", "User"), 5);
        assert_eq!(memory.count("other", "Log"), 4);
    }

    #[tokio::test]
    async fn test_namespace_cascade_sums_kinds() {
        let memory = seeded(&[("acme", "A", 12), ("acme", "B", 3), ("acme", "C", 700), ("", "A", 2)]);
        let engine = DeleteEngine::new(memory.clone(), DEFAULT_DELETE_PAGE);

        assert_eq!(engine.delete_namespace("acme").await.unwrap(), 715);
        assert!(memory.list_kinds("acme").await.unwrap().is_empty());
        assert_eq!(memory.list_namespaces().await.unwrap(), vec![""]);
        assert_eq!(memory.count("", "A"), 2);

        assert_eq!(engine.delete_namespace("acme").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_page_size_still_progresses() {
        let memory = seeded(&[("", "K", 3)]);
        let engine = DeleteEngine::new(memory.clone(), 0);
        assert_eq!(engine.delete_all_of_kind("", "K").await.unwrap(), 3);
        assert_eq!(memory.call_counts().delete_multi, 3);
    }
}
