//! Interactive menus.
//!
//! Every list screen is a [`ListNavigator`] driven by [`run_menu`]; this module
//! only decides what each outcome means for its screen and calls into [`App`].

use super::commands::{kind_from_file, App};
use super::terminal::Terminal;
use crate::codec;
use crate::config::{find_profiles, AppConfig, ConnectionProfile, StoreConfig};
use crate::error::Result;
use crate::models::display_namespace;
use crate::navigator::{run_menu, Label, ListNavigator, MenuSpec, NavOutcome};
use crate::pipeline;
use std::path::{Path, PathBuf};
use tracing::{error, info};

const NAMESPACE_COMMANDS: &[&str] = &[
    "<n> | <n-m> | 1,3-5   open namespaces",
    "SEARCH <keyword>      filter the list (SEARCH ALL resets)",
    "NEW <name>            open a namespace that has no kinds yet",
    "RM <selection>        delete namespaces with all their kinds",
    "CAB                   clear the filter, or quit",
];

const KIND_COMMANDS: &[&str] = &[
    "<n> | <n-m> | 1,3-5 | ALL   select kinds",
    "SEARCH <keyword>            filter the list (SEARCH ALL resets)",
    "CAB                         clear the filter, or go back",
];

const FILE_COMMANDS: &[&str] = &[
    "<n> | <n-m> | 1,3-5 | ALL   select files to import",
    "SEARCH <keyword>            filter the list (SEARCH ALL resets)",
    "CAB                         clear the filter, or go back",
];

const TARGET_COMMANDS: &[&str] = &[
    "<n>                  import into an existing kind",
    "NEW <name>           import into a new kind",
    "<Enter>              use the file name as the kind",
    "CAB                  skip this file",
];

const PROFILE_COMMANDS: &[&str] = &[
    "<n>                  connect with this profile",
    "SEARCH <keyword>     filter the list",
    "CAB                  clear the filter, or quit",
];

/// A namespace as listed in menus; the default namespace shows as `(default)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceLabel(pub String);

impl Label for NamespaceLabel {
    fn text(&self) -> &str {
        &self.0
    }

    fn display(&self) -> String {
        display_namespace(&self.0).to_string()
    }
}

/// A connection profile file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileLabel {
    pub path: PathBuf,
    file_name: String,
}

impl ProfileLabel {
    pub fn new(path: PathBuf) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, file_name }
    }
}

impl Label for ProfileLabel {
    fn text(&self) -> &str {
        &self.file_name
    }
}

/// Which store to connect to at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionChoice {
    /// The only option available; there is nothing to go back to.
    Fixed(StoreConfig),
    /// Picked from several profiles; the picker can be shown again.
    Picked(StoreConfig),
    Quit,
}

/// Prints a failed operation and keeps the menu alive. Interrupts propagate.
fn report(term: &Terminal, result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_interrupt() => Err(e),
        Err(e) => {
            error!("Operation failed: {}", e);
            term.error(&format!("Error: {}", e));
            Ok(())
        },
        Ok(()) => Ok(()),
    }
}

/// Lets the user pick a connection profile from the profile directory.
///
/// With no profile files the configured connection is used; a single profile
/// is used without asking.
pub fn choose_connection(config: &AppConfig, term: &mut Terminal) -> Result<ConnectionChoice> {
    let profiles = find_profiles(&config.profile_dir)?;
    match profiles.as_slice() {
        [] => return Ok(ConnectionChoice::Fixed(config.store.clone())),
        [only] => {
            info!("Using the only connection profile {}", only.display());
            let profile = ConnectionProfile::load(only)?;
            return Ok(ConnectionChoice::Fixed(profile.store_config(&config.store)));
        },
        _ => {},
    }

    let mut nav = ListNavigator::new(profiles.into_iter().map(ProfileLabel::new).collect());
    let spec = MenuSpec {
        title: "Connection profiles",
        commands: PROFILE_COMMANDS,
        prompt: "Profile",
        empty_message: "No profiles found.",
    };

    loop {
        match run_menu(&mut nav, term, &spec)? {
            NavOutcome::Selected(picked) => {
                let Some(label) = picked.into_iter().next() else {
                    continue;
                };
                match ConnectionProfile::load(&label.path) {
                    Ok(profile) => {
                        info!("Selected connection profile {}", label.path.display());
                        return Ok(ConnectionChoice::Picked(profile.store_config(&config.store)));
                    },
                    Err(e) => report(term, Err(e))?,
                }
            },
            NavOutcome::Back => return Ok(ConnectionChoice::Quit),
            NavOutcome::Empty => term.warn("Please choose a profile."),
            _ => term.warn("Profiles can only be selected here."),
        }
    }
}

async fn namespace_labels(app: &App) -> Result<Vec<NamespaceLabel>> {
    Ok(app
        .store()
        .list_namespaces()
        .await?
        .into_iter()
        .map(NamespaceLabel)
        .collect())
}

/// Top-level menu: the namespaces of the connected store.
pub async fn namespace_menu(app: &App, term: &mut Terminal) -> Result<()> {
    let mut nav = ListNavigator::new(namespace_labels(app).await?).with_verb("RM");
    let spec = MenuSpec {
        title: "Namespaces",
        commands: NAMESPACE_COMMANDS,
        prompt: "Namespace",
        empty_message: "No namespaces found.",
    };

    loop {
        match run_menu(&mut nav, term, &spec)? {
            NavOutcome::Selected(picked) => {
                for namespace in &picked {
                    namespace_actions(app, term, &namespace.0).await?;
                }
            },
            NavOutcome::Create(name) if name.is_empty() => {
                term.warn("NEW needs a namespace name.");
                continue;
            },
            NavOutcome::Create(name) => namespace_actions(app, term, &name).await?,
            NavOutcome::Command { labels, .. } => remove_namespaces(app, term, &labels).await?,
            NavOutcome::Empty => {
                term.warn("Please enter a selection.");
                continue;
            },
            NavOutcome::Back => return Ok(()),
            NavOutcome::Continue(_) => continue,
        }
        nav.reseed(namespace_labels(app).await?);
    }
}

async fn remove_namespaces(app: &App, term: &mut Terminal, labels: &[NamespaceLabel]) -> Result<()> {
    for label in labels {
        let prompt = format!(
            "Delete namespace {} and every kind in it?",
            label.display()
        );
        if !term.confirm(&prompt)? {
            continue;
        }
        let result = app.delete_namespace(&label.0).await.map(|_| ());
        report(term, result)?;
    }
    Ok(())
}

async fn namespace_actions(app: &App, term: &mut Terminal, namespace: &str) -> Result<()> {
    let options = ["Export kinds", "Import CSV files", "Remove kinds", "Back"];
    let title = format!("Namespace {}", display_namespace(namespace));

    loop {
        match term.choose(&title, &options)? {
            Some(0) => export_menu(app, term, namespace).await?,
            Some(1) => import_menu(app, term, namespace).await?,
            Some(2) => remove_kinds_menu(app, term, namespace).await?,
            _ => return Ok(()),
        }
    }
}

async fn export_menu(app: &App, term: &mut Terminal, namespace: &str) -> Result<()> {
    let kinds = app.store().list_kinds(namespace).await?;
    if kinds.is_empty() {
        term.warn(&format!(
            "No kinds in namespace {}.",
            display_namespace(namespace)
        ));
        return Ok(());
    }

    let mut nav = ListNavigator::new(kinds);
    let spec = MenuSpec {
        title: "Export kinds",
        commands: KIND_COMMANDS,
        prompt: "Kinds to export",
        empty_message: "No kinds found.",
    };

    loop {
        match run_menu(&mut nav, term, &spec)? {
            NavOutcome::Selected(kinds) => {
                for kind in &kinds {
                    let default = pipeline::default_export_name(namespace, kind);
                    let requested = term.input_or(&format!("File name for {}", kind), &default)?;
                    let path = pipeline::export_path(
                        &app.config().export_dir,
                        namespace,
                        kind,
                        Some(&requested),
                    );
                    let result = app.export_kind(namespace, kind, &path).await.map(|_| ());
                    report(term, result)?;
                }
            },
            NavOutcome::Empty => term.warn("Please enter a selection."),
            NavOutcome::Back => return Ok(()),
            _ => term.warn("Kinds can only be selected here."),
        }
    }
}

async fn remove_kinds_menu(app: &App, term: &mut Terminal, namespace: &str) -> Result<()> {
    let mut nav = ListNavigator::new(app.store().list_kinds(namespace).await?);
    let spec = MenuSpec {
        title: "Remove kinds",
        commands: KIND_COMMANDS,
        prompt: "Kinds to remove",
        empty_message: "No kinds found.",
    };

    loop {
        if nav.is_empty() {
            term.warn(&format!(
                "No kinds in namespace {}.",
                display_namespace(namespace)
            ));
            return Ok(());
        }

        match run_menu(&mut nav, term, &spec)? {
            NavOutcome::Selected(kinds) => {
                let prompt = format!("Delete all entities of {}?", kinds.join(", "));
                if term.confirm(&prompt)? {
                    let result = app.delete_kinds(namespace, &kinds).await.map(|_| ());
                    report(term, result)?;
                    nav.reseed(app.store().list_kinds(namespace).await?);
                }
            },
            NavOutcome::Empty => term.warn("Please enter a selection."),
            NavOutcome::Back => return Ok(()),
            _ => term.warn("Kinds can only be selected here."),
        }
    }
}

async fn import_menu(app: &App, term: &mut Terminal, namespace: &str) -> Result<()> {
    let import_dir = &app.config().import_dir;
    let export_dir = &app.config().export_dir;
    let folders = [
        format!("Import folder ({})", import_dir.display()),
        format!("Export folder ({})", export_dir.display()),
        "Back".to_string(),
    ];
    let dir = match term.choose("Read CSV files from", &folders)? {
        Some(0) => import_dir,
        Some(1) => export_dir,
        _ => return Ok(()),
    };

    let mut nav = ListNavigator::new(codec::list_csv_files(dir)?);
    let title = format!("CSV files in {}", dir.display());
    let spec = MenuSpec {
        title: &title,
        commands: FILE_COMMANDS,
        prompt: "Files to import",
        empty_message: "No CSV files found.",
    };

    loop {
        match run_menu(&mut nav, term, &spec)? {
            NavOutcome::Selected(files) => {
                for file in &files {
                    let path = dir.join(file);
                    let Some(kind) = target_kind(app, term, namespace, &path).await? else {
                        continue;
                    };
                    let result = app.import_file(namespace, &kind, &path).await.map(|_| ());
                    report(term, result)?;
                }
            },
            NavOutcome::Empty => term.warn("Please enter a selection."),
            NavOutcome::Back => return Ok(()),
            _ => term.warn("Files can only be selected here."),
        }
    }
}

/// Asks which kind a file goes into. `None` skips the file.
async fn target_kind(
    app: &App,
    term: &mut Terminal,
    namespace: &str,
    path: &Path,
) -> Result<Option<String>> {
    let from_file = kind_from_file(path);
    let mut nav = ListNavigator::new(app.store().list_kinds(namespace).await?);
    let title = format!("Target kind for {}", path.display());
    let spec = MenuSpec {
        title: &title,
        commands: TARGET_COMMANDS,
        prompt: "Kind",
        empty_message: "No kinds yet. Use NEW <name> or press Enter.",
    };

    loop {
        match run_menu(&mut nav, term, &spec)? {
            NavOutcome::Selected(kinds) => return Ok(kinds.into_iter().next()),
            NavOutcome::Create(name) if !name.is_empty() => return Ok(Some(name)),
            NavOutcome::Create(_) | NavOutcome::Empty if !from_file.is_empty() => {
                return Ok(Some(from_file));
            },
            NavOutcome::Back => return Ok(None),
            _ => term.warn("Please name the target kind."),
        }
    }
}
