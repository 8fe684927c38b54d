use super::terminal::{chunk_progress, progress_callback, render_list, Terminal};
use crate::config::{AppConfig, BackendKind};
use crate::delete::DeleteEngine;
use crate::error::{AppError, Result};
use crate::models::display_namespace;
use crate::pipeline::{self, BatchPipeline, ExportSummary, ImportSummary};
use crate::selection::{self, Selection};
use crate::store::SharedStore;
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tracing::info;

/// Bulk export, import and deletion for a namespace/kind entity store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Store backend (overrides DSM_BACKEND)
    #[arg(long, value_enum, global = true)]
    pub backend: Option<BackendKind>,

    /// Database connection URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// True when the connection was given on the command line.
    pub fn has_connection_override(&self) -> bool {
        self.backend.is_some() || self.database_url.is_some()
    }

    /// Applies command-line connection flags on top of `config`.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(backend) = self.backend {
            config.store.backend = backend;
        }
        if let Some(url) = &self.database_url {
            config.store.database_url = Some(url.clone());
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Browse namespaces and kinds interactively (the default)
    Interactive,

    /// Initialize the database schema
    InitDb,

    /// List namespaces
    Namespaces,

    /// List the kinds of a namespace
    Kinds(NamespaceArgs),

    /// Export kinds to CSV files
    Export(ExportArgs),

    /// Import a CSV file into a kind
    Import(ImportArgs),

    /// Delete every entity of the selected kinds
    DeleteKind(DeleteKindArgs),

    /// Delete every kind of a namespace
    DeleteNamespace(DeleteNamespaceArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct NamespaceArgs {
    /// Namespace (empty for the default namespace)
    #[arg(short, long, default_value = "")]
    pub namespace: String,
}

/// Which kinds of a namespace a command applies to.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct KindSelection {
    /// Kind names
    pub kinds: Vec<String>,

    /// Positions in the sorted kind list, e.g. "1,3-5"
    #[arg(short, long, conflicts_with = "all")]
    pub select: Option<String>,

    /// Every kind in the namespace
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ExportArgs {
    /// Namespace (empty for the default namespace)
    #[arg(short, long, default_value = "")]
    pub namespace: String,

    #[command(flatten)]
    pub kinds: KindSelection,

    /// Output directory (defaults to DSM_EXPORT_DIR)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ImportArgs {
    /// Namespace (empty for the default namespace)
    #[arg(short, long, default_value = "")]
    pub namespace: String,

    /// Target kind (defaults to the file name without extension)
    #[arg(short, long)]
    pub kind: Option<String>,

    /// CSV file with an EntityKey column
    pub file: PathBuf,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DeleteKindArgs {
    /// Namespace (empty for the default namespace)
    #[arg(short, long, default_value = "")]
    pub namespace: String,

    #[command(flatten)]
    pub kinds: KindSelection,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DeleteNamespaceArgs {
    /// Namespace (empty for the default namespace)
    #[arg(short, long, default_value = "")]
    pub namespace: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Resolves a [`KindSelection`] against the kinds that exist.
///
/// # Errors
///
/// Returns `AppError::Cli` for unknown kind names, for a selection that picks
/// nothing, and when no selection was given at all.
pub fn resolve_kinds(available: &[String], choice: &KindSelection) -> Result<Vec<String>> {
    let selection = if choice.all {
        Selection::All
    } else if let Some(expr) = &choice.select {
        selection::parse(expr, available.len())
    } else if !choice.kinds.is_empty() {
        let unknown: Vec<&str> = choice
            .kinds
            .iter()
            .filter(|kind| !available.contains(kind))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(AppError::Cli(format!("Unknown kind(s): {}", unknown.join(", "))));
        }
        return Ok(choice.kinds.clone());
    } else {
        return Err(AppError::Cli(
            "No kinds selected. Name them, or use --select or --all".to_string(),
        ));
    };

    match selection {
        Selection::Cancel | Selection::ResetFilter | Selection::Create(_) => Err(AppError::Cli(
            "Only positions, ranges and ALL are valid here".to_string(),
        )),
        Selection::All => Ok(available.to_vec()),
        indices => {
            let picked: Vec<String> = indices
                .positions(available.len())
                .iter()
                .filter_map(|&i| i.checked_sub(1).and_then(|i| available.get(i)).cloned())
                .collect();
            if picked.is_empty() {
                Err(AppError::Cli("The selection matched no kinds".to_string()))
            } else {
                Ok(picked)
            }
        },
    }
}

/// Kind name implied by a CSV file name: the name without its extension.
pub fn kind_from_file(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// CLI application
pub struct App {
    store: SharedStore,
    config: AppConfig,
}

impl App {
    pub fn new(store: SharedStore, config: AppConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn export_pipeline(&self) -> BatchPipeline {
        BatchPipeline::new(self.config.batch.export_chunk, self.config.batch.workers)
    }

    fn import_pipeline(&self) -> BatchPipeline {
        BatchPipeline::new(self.config.batch.import_chunk, self.config.batch.workers)
    }

    fn delete_engine(&self) -> DeleteEngine {
        DeleteEngine::new(self.store.clone(), self.config.batch.delete_page)
    }

    /// Run one non-interactive command
    pub async fn run_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Namespaces => {
                let namespaces: Vec<String> = self
                    .store
                    .list_namespaces()
                    .await?
                    .iter()
                    .map(|ns| display_namespace(ns).to_string())
                    .collect();
                println!("{}", render_list(&namespaces));
            },
            Commands::Kinds(args) => {
                let kinds = self.store.list_kinds(&args.namespace).await?;
                if kinds.is_empty() {
                    println!(
                        "No kinds in namespace {}",
                        display_namespace(&args.namespace)
                    );
                } else {
                    println!("{}", render_list(&kinds));
                }
            },
            Commands::Export(args) => {
                let available = self.store.list_kinds(&args.namespace).await?;
                let kinds = resolve_kinds(&available, &args.kinds)?;
                let dir = args.out.unwrap_or_else(|| self.config.export_dir.clone());
                for kind in &kinds {
                    let path = pipeline::export_path(&dir, &args.namespace, kind, None);
                    self.export_kind(&args.namespace, kind, &path).await?;
                }
            },
            Commands::Import(args) => {
                let kind = args.kind.unwrap_or_else(|| kind_from_file(&args.file));
                if kind.is_empty() {
                    return Err(AppError::Cli(format!(
                        "Cannot derive a kind from {}; pass --kind",
                        args.file.display()
                    )));
                }
                self.import_file(&args.namespace, &kind, &args.file).await?;
            },
            Commands::DeleteKind(args) => {
                let available = self.store.list_kinds(&args.namespace).await?;
                let kinds = resolve_kinds(&available, &args.kinds)?;
                let prompt = format!(
                    "Delete all entities of {} in namespace {}?",
                    kinds.join(", "),
                    display_namespace(&args.namespace)
                );
                if args.yes || Terminal::new().confirm(&prompt)? {
                    self.delete_kinds(&args.namespace, &kinds).await?;
                } else {
                    println!("{}", "Aborted.".yellow());
                }
            },
            Commands::DeleteNamespace(args) => {
                let prompt = format!(
                    "Delete every kind in namespace {}?",
                    display_namespace(&args.namespace)
                );
                if args.yes || Terminal::new().confirm(&prompt)? {
                    self.delete_namespace(&args.namespace).await?;
                } else {
                    println!("{}", "Aborted.".yellow());
                }
            },
            Commands::Interactive | Commands::InitDb => {
                return Err(AppError::Cli(format!(
                    "{:?} is not a batch command",
                    command
                )));
            },
        }

        Ok(())
    }

    /// Export one kind to `path`, showing chunk progress.
    pub async fn export_kind(&self, namespace: &str, kind: &str, path: &Path) -> Result<ExportSummary> {
        let bar = chunk_progress(&format!("Exporting {}", kind))?;
        let result = pipeline::export_kind(
            &self.store,
            &self.export_pipeline(),
            namespace,
            kind,
            path,
            progress_callback(&bar),
        )
        .await;
        bar.finish_and_clear();

        let summary = result?;
        println!(
            "{}",
            format!(
                "Exported {} record(s) of {} ({} columns) to {}",
                summary.records,
                kind,
                summary.columns,
                summary.path.display()
            )
            .green()
        );
        Ok(summary)
    }

    /// Import `path` into `kind`, showing chunk progress.
    pub async fn import_file(&self, namespace: &str, kind: &str, path: &Path) -> Result<ImportSummary> {
        let bar = chunk_progress(&format!("Importing {}", kind))?;
        let result = pipeline::import_file(
            &self.store,
            &self.import_pipeline(),
            namespace,
            kind,
            path,
            progress_callback(&bar),
        )
        .await;
        bar.finish_and_clear();

        let summary = result?;
        println!(
            "{}",
            format!(
                "Imported {} record(s) from {} into {}",
                summary.records,
                path.display(),
                kind
            )
            .green()
        );
        Ok(summary)
    }

    /// Delete every entity of each kind in turn; returns the total removed.
    pub async fn delete_kinds(&self, namespace: &str, kinds: &[String]) -> Result<usize> {
        let engine = self.delete_engine();
        let mut total = 0;
        for kind in kinds {
            let deleted = engine.delete_all_of_kind(namespace, kind).await?;
            println!(
                "{}",
                format!("Deleted {} entities of kind {}", deleted, kind).green()
            );
            total += deleted;
        }
        Ok(total)
    }

    /// Delete a whole namespace; returns the total removed.
    pub async fn delete_namespace(&self, namespace: &str) -> Result<usize> {
        let deleted = self.delete_engine().delete_namespace(namespace).await?;
        info!(
            "Namespace {} removed ({} entities)",
            display_namespace(namespace),
            deleted
        );
        println!(
            "{}",
            format!(
                "Deleted namespace {} ({} entities)",
                display_namespace(namespace),
                deleted
            )
            .green()
        );
        Ok(deleted)
    }
}
