//! Terminal rendering and prompts for the interactive shell.
//!
//! Lists are drawn with `comfy-table`, input goes through `dialoguer`, and
//! long-running batch jobs report through an `indicatif` progress bar.

use crate::error::Result;
use crate::navigator::{MenuIo, MenuSpec, Notice};
use colored::*;
use comfy_table::{presets::UTF8_BORDERS_ONLY, ContentArrangement, Table};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};

/// Interactive terminal backed by `dialoguer`.
pub struct Terminal {
    theme: ColorfulTheme,
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    /// Yes/no question, defaulting to "no".
    pub fn confirm(&self, prompt: &str) -> Result<bool> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()?)
    }

    /// Free-text input; blank input yields `default`.
    pub fn input_or(&self, prompt: &str, default: &str) -> Result<String> {
        let value: String = Input::with_theme(&self.theme)
            .with_prompt(format!("{} (default: {})", prompt, default))
            .allow_empty(true)
            .interact_text()?;
        let value = value.trim();
        Ok(if value.is_empty() {
            default.to_string()
        } else {
            value.to_string()
        })
    }

    /// Fixed-choice menu. Returns `None` when the user dismisses it.
    pub fn choose<T: ToString>(&self, prompt: &str, options: &[T]) -> Result<Option<usize>> {
        Ok(Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact_opt()?)
    }

    pub fn info(&self, message: &str) {
        println!("{}", message.green());
    }

    pub fn warn(&self, message: &str) {
        println!("{}", message.yellow());
    }

    pub fn error(&self, message: &str) {
        println!("{}", message.red());
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuIo for Terminal {
    fn show(&mut self, spec: &MenuSpec<'_>, items: &[String], filtered: bool) -> Result<()> {
        println!("\n{}", format!("=== {} ===", spec.title).cyan().bold());

        if items.is_empty() {
            println!("{}", spec.empty_message.dimmed());
        } else {
            println!("{}", render_list(items));
        }
        if filtered {
            println!("{}", "(filtered; type CAB to reset)".yellow());
        }

        println!("\nType one of the following commands:");
        for command in spec.commands {
            println!("  {}", command.dimmed());
        }
        Ok(())
    }

    fn read_line(&mut self, prompt: &str) -> Result<String> {
        Ok(Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?)
    }

    fn notice(&mut self, notice: &Notice) -> Result<()> {
        match notice {
            Notice::FilterApplied { matches } => {
                self.info(&format!("{} match(es).", matches));
            },
            Notice::FilterReset => self.info("Filter cleared."),
            Notice::NoMatches { keyword } => {
                self.warn(&format!("No items match '{}'. Showing the full list.", keyword));
            },
            Notice::InvalidSelection => self.warn("No valid selection."),
            Notice::MissingArgument { verb } => {
                self.warn(&format!("{} needs a selection, e.g. {} 1,3-5", verb, verb));
            },
        }
        Ok(())
    }
}

/// Numbered two-column table of `items`.
pub fn render_list(items: &[String]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic);
    for (i, item) in items.iter().enumerate() {
        table.add_row(vec![format!("{}.", i + 1), item.clone()]);
    }
    table
}

/// Progress bar counting finished chunks of a batch job.
pub fn chunk_progress(message: &str) -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{msg} [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)",
        )?
        .progress_chars("=> "),
    );
    bar.set_message(message.to_string());
    Ok(bar)
}

/// Adapts a progress bar to the pipeline's `(completed, total)` callback.
pub fn progress_callback(bar: &ProgressBar) -> impl FnMut(usize, usize) + '_ {
    move |completed, total| {
        bar.set_length(total as u64);
        bar.set_position(completed as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_list_numbers_items() {
        let rendered = render_list(&["(default)".to_string(), "tenant".to_string()]).to_string();
        assert!(rendered.contains("1."));
        assert!(rendered.contains("(default)"));
        assert!(rendered.contains("2."));
        assert!(rendered.contains("tenant"));
    }

    #[test]
    fn test_progress_callback_tracks_chunks() {
        let bar = chunk_progress("Exporting").unwrap();
        {
            let mut report = progress_callback(&bar);
            report(1, 4);
            report(3, 4);
        }
        assert_eq!(bar.position(), 3);
    }
}
