//! Application configuration.
//!
//! Values come from the process environment (after loading a `.env` file, if
//! present) and can be overridden by command-line flags. Connection settings
//! end up in a [`StoreConfig`] that is handed to the store constructor; nothing
//! here writes back to the environment.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Records per export chunk.
pub const DEFAULT_EXPORT_CHUNK: usize = 100;
/// Rows per import chunk (one upsert call each).
pub const DEFAULT_IMPORT_CHUNK: usize = 50;
/// Keys fetched and deleted per round of the delete loop.
pub const DEFAULT_DELETE_PAGE: usize = 500;
/// Concurrent pipeline workers.
pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Which store implementation to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Postgres,
    Memory,
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(BackendKind::Postgres),
            "memory" | "mem" => Ok(BackendKind::Memory),
            other => Err(AppError::Config(format!("unknown backend '{}'", other))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Postgres => f.write_str("postgres"),
            BackendKind::Memory => f.write_str("memory"),
        }
    }
}

/// Everything needed to construct a store client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

/// Batch sizes and worker count for the bulk engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub workers: usize,
    pub export_chunk: usize,
    pub import_chunk: usize,
    pub delete_page: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            export_chunk: DEFAULT_EXPORT_CHUNK,
            import_chunk: DEFAULT_IMPORT_CHUNK,
            delete_page: DEFAULT_DELETE_PAGE,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub batch: BatchSettings,
    /// Directory scanned for connection profile JSON files.
    pub profile_dir: PathBuf,
    pub export_dir: PathBuf,
    pub import_dir: PathBuf,
    /// Attempts to connect before the start-up loop gives up.
    pub connect_attempts: u32,
    /// When set, logs are also written to daily files in this directory.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Builds the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let backend = match env::var("DSM_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => BackendKind::Postgres,
        };

        let config = Self {
            store: StoreConfig {
                backend,
                database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
                max_connections: env_number("DSM_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            },
            batch: BatchSettings {
                workers: env_number("DSM_WORKERS", DEFAULT_WORKERS)?,
                export_chunk: env_number("DSM_EXPORT_CHUNK", DEFAULT_EXPORT_CHUNK)?,
                import_chunk: env_number("DSM_IMPORT_CHUNK", DEFAULT_IMPORT_CHUNK)?,
                delete_page: env_number("DSM_DELETE_PAGE", DEFAULT_DELETE_PAGE)?,
            },
            profile_dir: env_path("DSM_PROFILE_DIR", "."),
            export_dir: env_path("DSM_EXPORT_DIR", "export"),
            import_dir: env_path("DSM_IMPORT_DIR", "import"),
            connect_attempts: env_number("DSM_CONNECT_ATTEMPTS", DEFAULT_CONNECT_ATTEMPTS)?,
            log_dir: env::var("DSM_LOG_DIR").ok().map(PathBuf::from),
        };
        debug!(?config, "Loaded configuration");
        Ok(config)
    }
}

/// Reads a positive number from `name`, falling back to `default` when unset.
fn env_number<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + From<u8>,
{
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => {
            let value = raw
                .trim()
                .parse::<T>()
                .map_err(|_| AppError::Config(format!("{} must be a number, got '{}'", name, raw)))?;
            if value < T::from(1) {
                return Err(AppError::Config(format!("{} must be at least 1", name)));
            }
            Ok(value)
        },
    }
}

fn env_path(name: &str, default: &str) -> PathBuf {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .map_or_else(|| PathBuf::from(default), PathBuf::from)
}

/// A named set of connection settings stored as a JSON file.
///
/// ```json
/// { "name": "staging", "backend": "postgres", "database_url": "postgres://..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
}

fn default_backend() -> BackendKind {
    BackendKind::Postgres
}

impl ConnectionProfile {
    /// Loads a profile from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be read and
    /// `AppError::JsonParse` if it is not a valid profile.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let profile: ConnectionProfile = serde_json::from_str(&raw)?;
        debug!("Loaded connection profile from {}", path.display());
        Ok(profile)
    }

    /// Store settings from this profile, inheriting unset values from `base`.
    pub fn store_config(&self, base: &StoreConfig) -> StoreConfig {
        StoreConfig {
            backend: self.backend,
            database_url: self.database_url.clone().or_else(|| base.database_url.clone()),
            max_connections: self.max_connections.unwrap_or(base.max_connections),
        }
    }
}

/// Lists `*.json` files in `dir`, sorted by file name.
///
/// A missing directory yields an empty list.
pub fn find_profiles(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Profile directory {} does not exist", dir.display());
            return Ok(Vec::new());
        },
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
