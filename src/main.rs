mod cli;
mod codec;
mod config;
mod delete;
mod error;
mod models;
mod navigator;
mod pipeline;
mod selection;
mod store;

use clap::Parser;
use cli::{App, Cli, Commands, ConnectionChoice, Terminal};
use colored::*;
use config::AppConfig;
use error::{AppError, Result};
use std::path::Path;
use std::time::Duration;
use store::AttemptBudget;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// Pause between automatic reconnection attempts.
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    cli.apply_overrides(&mut config);

    // Keeps the file writer flushing until exit.
    let _log_guard = init_logging(config.log_dir.as_deref())?;
    info!("Starting datastore manager ({} backend)", config.store.backend);

    let outcome = match cli.command.clone() {
        None | Some(Commands::Interactive) => run_shell(config, cli.has_connection_override()).await,
        Some(Commands::InitDb) => store::init_schema(&config.store).await.map(|_| {
            println!("{}", "Database schema initialized.".green());
        }),
        Some(command) => {
            let connected = store::with_retry(config.connect_attempts, RETRY_DELAY, |_| {
                store::connect_checked(&config.store)
            })
            .await;
            match connected {
                Ok(store) => App::new(store, config).run_command(command).await,
                Err(e) => Err(e),
            }
        },
    };

    match outcome {
        Err(e) if e.is_interrupt() => {
            info!("Interrupted by user");
            Ok(())
        },
        Err(e) => {
            error!("Command execution failed: {:?}", e);
            eprintln!("{} {}", "Error:".red(), e.to_string().red());
            Err(e)
        },
        Ok(()) => Ok(()),
    }
}

/// Logs go to stderr, or to daily files under `log_dir` when it is set, so
/// stdout stays free for the menus.
fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env();
    match log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("datastore-manager")
                .filename_suffix("log")
                .build(dir)
                .map_err(|e| AppError::Config(format!("cannot log to {}: {}", dir.display(), e)))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        },
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        },
    }
}

/// Interactive session: pick a connection, browse it, repeat.
///
/// Consecutive connection failures are bounded by `connect_attempts`.
async fn run_shell(config: AppConfig, fixed_connection: bool) -> Result<()> {
    let mut term = Terminal::new();
    println!("{}", "Welcome to the datastore manager!".cyan().bold());

    let mut budget = AttemptBudget::new(config.connect_attempts);
    loop {
        let choice = if fixed_connection {
            ConnectionChoice::Fixed(config.store.clone())
        } else {
            cli::choose_connection(&config, &mut term)?
        };
        let (store_config, can_switch) = match choice {
            ConnectionChoice::Fixed(store_config) => (store_config, false),
            ConnectionChoice::Picked(store_config) => (store_config, true),
            ConnectionChoice::Quit => break,
        };

        match store::connect_checked(&store_config).await {
            Ok(store) => {
                budget.reset();
                info!("Connected to {} store", store_config.backend);
                let app = App::new(store, config.clone());
                cli::namespace_menu(&app, &mut term).await?;
                if !can_switch {
                    break;
                }
            },
            Err(e) => {
                let exhausted = budget.fail();
                error!("Connection failed ({}/{}): {}", budget.failures(), budget.limit(), e);
                term.error(&format!("Could not connect: {}", e));
                if exhausted {
                    return Err(e);
                }
                term.warn(&format!(
                    "Attempt {}/{} failed. Check the connection settings and try again.",
                    budget.failures(),
                    budget.limit()
                ));
                if !can_switch {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            },
        }
    }

    println!("{}", "Exiting. Goodbye!".green());
    Ok(())
}
