//! Filterable list navigation shared by every list menu.
//!
//! A [`ListNavigator`] owns an ordered label list and the current filter.
//! Each line of user input is fed to [`ListNavigator::handle`], which either
//! updates the filter and asks the caller to keep looping, or hands back a
//! decision (selected labels, a creation request, a caller-declared command,
//! or a back signal). The navigator never performs the action itself, so the
//! same state machine drives the namespace, kind, file and profile pickers.
//!
//! [`run_menu`] wraps the loop around a [`MenuIo`] so the terminal shell and
//! the tests can drive it the same way.

use crate::error::Result;
use crate::selection::{self, Selection};
use tracing::debug;

/// An item that can be listed, searched and selected.
pub trait Label: Clone {
    /// Text that searches match against.
    fn text(&self) -> &str;

    /// Text shown to the user. Defaults to [`Label::text`].
    fn display(&self) -> String {
        self.text().to_string()
    }
}

impl Label for String {
    fn text(&self) -> &str {
        self
    }
}

/// Filter state of a navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Unfiltered,
    Filtered,
}

/// Informational outcomes that keep the menu loop running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A search narrowed the list to `matches` items.
    FilterApplied { matches: usize },
    /// The filter was cleared.
    FilterReset,
    /// A search found nothing; the full list is shown again.
    NoMatches { keyword: String },
    /// The input produced no valid positions.
    InvalidSelection,
    /// A command verb was typed without its argument.
    MissingArgument { verb: String },
}

/// What a single line of input resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome<L> {
    /// Keep looping; optionally tell the user something.
    Continue(Option<Notice>),
    /// Labels picked from the current (possibly filtered) list, in list order.
    Selected(Vec<L>),
    /// `NEW <name>`; the name may be empty.
    Create(String),
    /// A caller-declared verb followed by a selection, e.g. `RM 1,3-5`.
    Command { verb: String, labels: Vec<L> },
    /// Blank input.
    Empty,
    /// Leave the menu.
    Back,
}

/// Generic filter/search/select state machine over an ordered label list.
#[derive(Debug, Clone)]
pub struct ListNavigator<L> {
    original: Vec<L>,
    filtered: Vec<L>,
    mode: FilterMode,
    verbs: Vec<String>,
}

impl<L: Label> ListNavigator<L> {
    pub fn new(labels: Vec<L>) -> Self {
        Self {
            filtered: labels.clone(),
            original: labels,
            mode: FilterMode::Unfiltered,
            verbs: Vec::new(),
        }
    }

    /// Declares an extra command verb (matched case-insensitively) whose
    /// argument is parsed with the selection grammar.
    pub fn with_verb(mut self, verb: &str) -> Self {
        self.verbs.push(verb.to_uppercase());
        self
    }

    /// Replaces the backing list after the caller mutated it; clears any filter.
    pub fn reseed(&mut self, labels: Vec<L>) {
        self.filtered = labels.clone();
        self.original = labels;
        self.mode = FilterMode::Unfiltered;
    }

    pub fn is_filtered(&self) -> bool {
        self.mode == FilterMode::Filtered
    }

    /// The list currently on screen.
    pub fn visible(&self) -> &[L] {
        &self.filtered
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Applies one line of user input.
    pub fn handle(&mut self, input: &str) -> NavOutcome<L> {
        let input = input.trim();
        if input.is_empty() {
            return NavOutcome::Empty;
        }

        let (head, rest) = split_command(input);
        let head_upper = head.to_uppercase();

        if head_upper == "SEARCH" {
            return NavOutcome::Continue(Some(self.search(rest)));
        }

        if let Some(verb) = self.verbs.iter().find(|v| **v == head_upper).cloned() {
            return self.verb_command(verb, rest);
        }

        match self.resolve(selection::parse(input, self.filtered.len())) {
            Selection::Cancel => NavOutcome::Back,
            Selection::ResetFilter => {
                self.clear_filter();
                NavOutcome::Continue(Some(Notice::FilterReset))
            },
            Selection::Create(name) => NavOutcome::Create(name),
            other => {
                let labels = self.pick(&other.positions(self.filtered.len()));
                if labels.is_empty() {
                    NavOutcome::Continue(Some(Notice::InvalidSelection))
                } else {
                    NavOutcome::Selected(labels)
                }
            },
        }
    }

    /// `CAB` resets an active filter before it means "back".
    fn resolve(&self, selection: Selection) -> Selection {
        match selection {
            Selection::Cancel if self.is_filtered() => Selection::ResetFilter,
            other => other,
        }
    }

    fn search(&mut self, keyword: &str) -> Notice {
        let keyword = keyword.trim();
        if keyword.is_empty() || keyword.eq_ignore_ascii_case("ALL") {
            self.clear_filter();
            return Notice::FilterReset;
        }

        let needle = keyword.to_lowercase();
        let matches: Vec<L> = self
            .original
            .iter()
            .filter(|label| label.text().to_lowercase().contains(&needle))
            .cloned()
            .collect();
        debug!("Search '{}' matched {} item(s)", keyword, matches.len());

        if matches.is_empty() {
            self.clear_filter();
            Notice::NoMatches {
                keyword: keyword.to_string(),
            }
        } else {
            let count = matches.len();
            self.filtered = matches;
            self.mode = FilterMode::Filtered;
            Notice::FilterApplied { matches: count }
        }
    }

    fn verb_command(&mut self, verb: String, argument: &str) -> NavOutcome<L> {
        if argument.trim().is_empty() {
            return NavOutcome::Continue(Some(Notice::MissingArgument { verb }));
        }
        match selection::parse(argument, self.filtered.len()) {
            // `RM CAB` abandons the command but stays in the menu.
            Selection::Cancel => NavOutcome::Continue(None),
            selection => {
                let labels = self.pick(&selection.positions(self.filtered.len()));
                if labels.is_empty() {
                    NavOutcome::Continue(Some(Notice::InvalidSelection))
                } else {
                    NavOutcome::Command { verb, labels }
                }
            },
        }
    }

    fn clear_filter(&mut self) {
        self.filtered = self.original.clone();
        self.mode = FilterMode::Unfiltered;
    }

    fn pick(&self, positions: &[usize]) -> Vec<L> {
        positions
            .iter()
            .filter_map(|&i| i.checked_sub(1).and_then(|i| self.filtered.get(i)))
            .cloned()
            .collect()
    }
}

/// Splits `"SEARCH foo bar"` into `("SEARCH", "foo bar")`.
fn split_command(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (input, ""),
    }
}

/// Static description of a menu screen.
#[derive(Debug, Clone, Copy)]
pub struct MenuSpec<'a> {
    pub title: &'a str,
    /// Command help lines shown under the list.
    pub commands: &'a [&'a str],
    pub prompt: &'a str,
    /// Shown instead of the list when it is empty.
    pub empty_message: &'a str,
}

/// Terminal side of a menu: how a screen is shown and a line is read.
pub trait MenuIo {
    fn show(&mut self, spec: &MenuSpec<'_>, items: &[String], filtered: bool) -> Result<()>;
    fn read_line(&mut self, prompt: &str) -> Result<String>;
    fn notice(&mut self, notice: &Notice) -> Result<()>;
}

/// Runs the show → read → handle loop until the navigator produces a decision.
pub fn run_menu<L, IO>(
    navigator: &mut ListNavigator<L>,
    io: &mut IO,
    spec: &MenuSpec<'_>,
) -> Result<NavOutcome<L>>
where
    L: Label,
    IO: MenuIo + ?Sized,
{
    loop {
        let items: Vec<String> = navigator.visible().iter().map(Label::display).collect();
        io.show(spec, &items, navigator.is_filtered())?;

        let line = io.read_line(spec.prompt)?;
        match navigator.handle(&line) {
            NavOutcome::Continue(Some(notice)) => io.notice(&notice)?,
            NavOutcome::Continue(None) => {},
            decision => return Ok(decision),
        }
    }
}
