//! Kind → CSV export.
//!
//! Records are fetched in one sequential pass, the header is computed from the
//! union of their property names, then the pipeline projects chunks of
//! records onto that header in parallel before a single file write.

use super::BatchPipeline;
use crate::codec;
use crate::error::Result;
use crate::models::{Entity, ENTITY_KEY_COLUMN};
use crate::store::SharedStore;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one export call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub records: usize,
    /// Header width, `EntityKey` included.
    pub columns: usize,
}

/// `EntityKey` followed by the sorted union of every record's property names.
///
/// A property literally named `EntityKey` is left out so the key column stays unique.
pub fn export_header(entities: &[Entity]) -> Vec<String> {
    let names = entities
        .par_iter()
        .map(|entity| entity.properties.keys().cloned().collect::<BTreeSet<_>>())
        .reduce(BTreeSet::new, |mut all, names| {
            all.extend(names);
            all
        });

    std::iter::once(ENTITY_KEY_COLUMN.to_string())
        .chain(names.into_iter().filter(|name| name != ENTITY_KEY_COLUMN))
        .collect()
}

/// Number of records carrying a property named `EntityKey`, which the export
/// has no column for.
pub fn shadowed_key_properties(entities: &[Entity]) -> usize {
    entities
        .par_iter()
        .filter(|entity| entity.properties.contains_key(ENTITY_KEY_COLUMN))
        .count()
}

/// Projects one record onto `header`; absent properties become empty cells.
pub fn project(entity: &Entity, header: &[String]) -> Vec<String> {
    std::iter::once(entity.key.id.to_string())
        .chain(header.iter().skip(1).map(|column| entity.cell(column)))
        .collect()
}

/// Default export file name: `<kind>.csv`, or `<namespace>_<kind>.csv` outside
/// the default namespace.
pub fn default_export_name(namespace: &str, kind: &str) -> String {
    if namespace.is_empty() {
        format!("{}.csv", kind)
    } else {
        format!("{}_{}.csv", namespace, kind)
    }
}

/// Resolves where an export lands. A user-supplied name gets `.csv` appended
/// when it lacks the extension; a blank name falls back to the default.
pub fn export_path(dir: &Path, namespace: &str, kind: &str, requested: Option<&str>) -> PathBuf {
    let name = match requested.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) if name.to_lowercase().ends_with(".csv") => name.to_string(),
        Some(name) => format!("{}.csv", name),
        None => default_export_name(namespace, kind),
    };
    dir.join(name)
}

/// Exports every record of `kind` to `path`.
///
/// An empty kind still produces a file holding just the `EntityKey` header.
///
/// # Errors
///
/// Store failures abort before anything is written; file errors surface as
/// `AppError::Io`/`AppError::Csv`.
pub async fn export_kind<P>(
    store: &SharedStore,
    pipeline: &BatchPipeline,
    namespace: &str,
    kind: &str,
    path: &Path,
    on_progress: P,
) -> Result<ExportSummary>
where
    P: FnMut(usize, usize),
{
    info!(
        "Exporting [namespace={}] kind {} -> {}",
        crate::models::display_namespace(namespace),
        kind,
        path.display()
    );

    let entities = store.fetch_all(namespace, kind).await?;
    let records = entities.len();
    let shadowed = shadowed_key_properties(&entities);
    if shadowed > 0 {
        warn!(
            "Kind {} has {} record(s) with a property named {}; it is left out of the export",
            kind, shadowed, ENTITY_KEY_COLUMN
        );
    }
    let header = Arc::new(export_header(&entities));
    info!(
        "Processing {} record(s) across {} column(s) in chunks of {}",
        records,
        header.len(),
        pipeline.chunk_size()
    );

    let rows = {
        let header = Arc::clone(&header);
        pipeline
            .run(
                entities,
                move |chunk: Vec<Entity>| {
                    let header = Arc::clone(&header);
                    async move {
                        Ok(chunk
                            .iter()
                            .map(|entity| project(entity, &header))
                            .collect::<Vec<_>>())
                    }
                },
                on_progress,
            )
            .await?
    };

    codec::write_table(path, &header, &rows)?;
    info!("Export completed: {} record(s)", records);

    Ok(ExportSummary {
        path: path.to_path_buf(),
        records,
        columns: header.len(),
    })
}
