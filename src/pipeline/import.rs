//! CSV → kind import.
//!
//! The whole file is read and validated before the first write, so a file
//! without an `EntityKey` column imports nothing. Each chunk of rows becomes
//! one `put_multi` call.

use super::BatchPipeline;
use crate::codec;
use crate::error::Result;
use crate::models::{Entity, EntityId, Key};
use crate::store::SharedStore;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one import call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub records: usize,
}

/// Column layout shared by every import worker.
#[derive(Debug, Clone)]
struct RowLayout {
    namespace: String,
    kind: String,
    header: Vec<String>,
    key_column: usize,
}

impl RowLayout {
    /// Builds the entity for one CSV row.
    ///
    /// The key cell picks the identifier type; every other cell becomes a
    /// string property, imported verbatim.
    fn entity(&self, row: &[String]) -> Entity {
        let raw_key = row.get(self.key_column).map_or("", String::as_str);
        let key = Key::new(&self.namespace, &self.kind, EntityId::parse(raw_key));

        let properties = self
            .header
            .iter()
            .zip(row)
            .enumerate()
            .filter(|(i, _)| *i != self.key_column)
            .map(|(_, (column, value))| (column.clone(), Value::String(value.clone())))
            .collect();
        Entity { key, properties }
    }
}

/// Imports every row of the CSV file at `path` into `kind`.
///
/// # Errors
///
/// Returns `AppError::Format` when the file has no `EntityKey` column (nothing
/// is written), and the first store error when an upsert fails.
pub async fn import_file<P>(
    store: &SharedStore,
    pipeline: &BatchPipeline,
    namespace: &str,
    kind: &str,
    path: &Path,
    on_progress: P,
) -> Result<ImportSummary>
where
    P: FnMut(usize, usize),
{
    info!(
        "Importing CSV {} -> [namespace={}] kind {}",
        path.display(),
        crate::models::display_namespace(namespace),
        kind
    );

    let table = codec::read_table(path)?;
    if table.rows.is_empty() {
        info!("No data to import from {}", path.display());
        return Ok(ImportSummary { records: 0 });
    }
    info!(
        "Processing {} record(s) in chunks of {} with {} worker(s)",
        table.rows.len(),
        pipeline.chunk_size(),
        pipeline.workers()
    );

    let layout = Arc::new(RowLayout {
        namespace: namespace.to_string(),
        kind: kind.to_string(),
        header: table.header,
        key_column: table.key_column,
    });

    let written = pipeline
        .run(
            table.rows,
            |rows: Vec<Vec<String>>| {
                let layout = Arc::clone(&layout);
                let store = Arc::clone(store);
                async move {
                    let entities: Vec<Entity> = rows.iter().map(|row| layout.entity(row)).collect();
                    store.put_multi(&entities).await?;
                    debug!("Upserted chunk of {} record(s)", entities.len());
                    Ok(vec![entities.len()])
                }
            },
            on_progress,
        )
        .await?;

    let records: usize = written.iter().sum();
    info!("Import completed. Inserted/updated {} record(s)", records);
    Ok(ImportSummary { records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::pipeline::export_kind;
    use crate::store::{MemoryStore, Store};
    use serde_json::json;
    use std::fs;

    fn shared(memory: MemoryStore) -> (Arc<MemoryStore>, SharedStore) {
        let memory = Arc::new(memory);
        let store: SharedStore = memory.clone();
        (memory, store)
    }

    #[tokio::test]
    async fn test_missing_key_column_writes_nothing() {
        let (memory, store) = shared(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "Name,Value\nfoo,1\nbar,2\n").unwrap();

        let result = import_file(&store, &BatchPipeline::new(50, 5), "", "Thing", &path, |_, _| {}).await;

        assert!(matches!(result, Err(AppError::Format(_))));
        assert_eq!(memory.call_counts().put_multi, 0);
        assert!(store.list_kinds("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rows_become_entities_with_typed_keys() {
        let (memory, store) = shared(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        fs::write(&path, "name,EntityKey,age\nAna,17,33\nBo,bo-x,\n").unwrap();

        let summary = import_file(&store, &BatchPipeline::new(1, 2), "hr", "Person", &path, |_, _| {})
            .await
            .unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(memory.call_counts().put_multi, 2);

        let people = store.fetch_all("hr", "Person").await.unwrap();
        let ana = people.iter().find(|e| e.key.id == EntityId::Id(17)).unwrap();
        assert_eq!(ana.properties["name"], json!("Ana"));
        assert_eq!(ana.properties["age"], json!("33"));
        assert!(!ana.properties.contains_key("EntityKey"));

        let bo = people
            .iter()
            .find(|e| e.key.id == EntityId::Name("bo-x".into()))
            .unwrap();
        assert_eq!(bo.properties["age"], json!(""));
    }

    #[tokio::test]
    async fn test_one_put_per_chunk() {
        let (memory, store) = shared(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("many.csv");
        let mut body = String::from("EntityKey,v\n");
        for i in 0..120 {
            body.push_str(&format!("{},{}\n", i + 1, i));
        }
        fs::write(&path, body).unwrap();

        let mut ticks = 0;
        let summary = import_file(&store, &BatchPipeline::new(50, 5), "", "K", &path, |_, _| ticks += 1)
            .await
            .unwrap();

        assert_eq!(summary.records, 120);
        assert_eq!(ticks, 3);
        assert_eq!(memory.call_counts().put_multi, 3);
        assert_eq!(memory.count("", "K"), 120);
    }

    #[tokio::test]
    async fn test_empty_file_makes_no_calls() {
        let (memory, store) = shared(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "EntityKey,a\n").unwrap();

        let summary = import_file(&store, &BatchPipeline::new(50, 5), "", "K", &path, |_, _| {})
            .await
            .unwrap();
        assert_eq!(summary.records, 0);
        assert_eq!(memory.call_counts().put_multi, 0);
    }

    #[tokio::test]
    async fn test_store_failure_fails_import() {
        let memory = MemoryStore::new();
        memory.fail_put_call(2);
        let (_memory, store) = shared(memory);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.csv");
        fs::write(&path, "EntityKey\n1\n2\n3\n").unwrap();

        let result = import_file(&store, &BatchPipeline::new(1, 1), "", "K", &path, |_, _| {}).await;
        assert!(matches!(result, Err(AppError::Store(_))));
    }

    #[tokio::test]
    async fn test_signed_and_boundary_ids_keep_their_type() {
        let source = MemoryStore::new();
        source.insert(
            [EntityId::Id(-5), EntityId::Id(i64::MIN), EntityId::Id(i64::MAX), EntityId::Name("k-1".into())]
                .into_iter()
                .map(|id| Entity::new(Key::new("", "Edge", id)).with_property("v", 1)),
        );
        let (_src, source) = shared(source);
        let (_dst, target) = shared(MemoryStore::new());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Edge.csv");
        let pipeline = BatchPipeline::new(2, 2);
        export_kind(&source, &pipeline, "", "Edge", &path, |_, _| {}).await.unwrap();
        import_file(&target, &pipeline, "", "Edge", &path, |_, _| {}).await.unwrap();

        let ids = |entities: Vec<Entity>| entities.into_iter().map(|e| e.key.id).collect::<Vec<_>>();
        assert_eq!(
            ids(target.fetch_all("", "Edge").await.unwrap()),
            ids(source.fetch_all("", "Edge").await.unwrap())
        );
    }

    #[tokio::test]
    async fn test_export_then_import_round_trip() {
        let source = MemoryStore::new();
        source.insert([
            Entity::new(Key::new("app", "Order", EntityId::Id(1001)))
                .with_property("total", 19.5)
                .with_property("coupon", "SAVE10"),
            Entity::new(Key::new("app", "Order", EntityId::Name("legacy-7".into())))
                .with_property("total", 3)
                .with_property("paid", true),
            Entity::new(Key::new("app", "Order", EntityId::Id(42))).with_property("note", "a,b \"c\""),
        ]);
        let (_src, source): (_, SharedStore) = shared(source);
        let (_dst, target) = shared(MemoryStore::new());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app_Order.csv");
        let pipeline = BatchPipeline::new(2, 3);

        export_kind(&source, &pipeline, "app", "Order", &path, |_, _| {}).await.unwrap();
        import_file(&target, &pipeline, "app", "OrderCopy", &path, |_, _| {}).await.unwrap();

        let original = source.fetch_all("app", "Order").await.unwrap();
        let copied = target.fetch_all("app", "OrderCopy").await.unwrap();
        assert_eq!(original.len(), copied.len());

        for entity in &original {
            let copy = copied
                .iter()
                .find(|c| c.key.id == entity.key.id)
                .expect("key type and value preserved");
            for name in entity.properties.keys() {
                assert_eq!(copy.properties[name], json!(entity.cell(name)));
            }
        }
    }
}
