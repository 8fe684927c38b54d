//! Tabular file format used by export and import.
//!
//! Files are plain CSV with a header row. The first exported column is always
//! `EntityKey`; on import the column may sit anywhere but must be present.

use crate::error::{AppError, Result};
use crate::models::ENTITY_KEY_COLUMN;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Contents of an import file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    /// Position of the `EntityKey` column in `header`.
    pub key_column: usize,
    pub rows: Vec<Vec<String>>,
}

/// Writes `header` followed by `rows` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns `AppError::Io` if the directory or file cannot be created and
/// `AppError::Csv` if writing a record fails.
pub fn write_table(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    debug!("Wrote {} row(s) to {}", rows.len(), path.display());
    Ok(())
}

/// Reads a whole import file into memory.
///
/// # Errors
///
/// Returns `AppError::Format` when the header has no `EntityKey` column,
/// `AppError::Csv` for malformed records (e.g. a row with the wrong number of
/// fields) and `AppError::Io`/`AppError::Csv` if the file cannot be opened.
pub fn read_table(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let key_column = header
        .iter()
        .position(|column| column == ENTITY_KEY_COLUMN)
        .ok_or_else(|| {
            AppError::Format(format!(
                "{} must have a column named {}",
                path.display(),
                ENTITY_KEY_COLUMN
            ))
        })?;

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }

    debug!("Read {} row(s) from {}", rows.len(), path.display());
    Ok(Table {
        header,
        key_column,
        rows,
    })
}

/// Lists `*.csv` file names (not paths) in `dir`, sorted. Creates `dir` if missing.
pub fn list_csv_files(dir: &Path) -> Result<Vec<String>> {
    fs::create_dir_all(dir)?;
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_lowercase().ends_with(".csv") && entry.path().is_file() {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}
