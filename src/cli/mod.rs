//! Handles Command Line Interface (CLI) related functionalities.
//!
//! Includes the clap command definitions and the batch `App` (`commands`), the
//! interactive namespace/kind/file/profile menus (`menus`), and the dialoguer
//! and indicatif terminal plumbing they share (`terminal`).

mod commands;
mod menus;
mod terminal;

#[cfg(test)]
mod commands_test;

pub use commands::*;
pub use menus::{choose_connection, namespace_menu, ConnectionChoice};
pub use terminal::Terminal;
