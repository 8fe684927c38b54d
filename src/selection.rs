//! Selection grammar shared by every list menu.
//!
//! Accepted forms (keywords are case-insensitive):
//! - `CAB` cancels / goes back,
//! - `ALL` selects every position,
//! - `NEW <name>` requests creation of `<name>`,
//! - `1,3-5,9` selects single positions and inclusive ranges.
//!
//! Malformed or out-of-range tokens are dropped silently; a selection that
//! yields nothing comes back as an empty `Indices` set.

/// Outcome of parsing one line of user input against a list of `max_index` items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Navigate back (or reset an active filter).
    Cancel,
    /// Clear an active filter without leaving the menu.
    ResetFilter,
    /// Every item in the list.
    All,
    /// 1-based positions, deduplicated and ascending.
    Indices(Vec<usize>),
    /// `NEW <name>`: the caller decides what creating means.
    Create(String),
}

impl Selection {
    /// Resolves the selection to concrete positions for a list of `max_index` items.
    ///
    /// `All` expands to `1..=max_index`; non-index variants yield an empty vector.
    pub fn positions(&self, max_index: usize) -> Vec<usize> {
        match self {
            Selection::All => (1..=max_index).collect(),
            Selection::Indices(indices) => indices.clone(),
            _ => Vec::new(),
        }
    }
}

/// Parses `input` into a [`Selection`] for a list of `max_index` items.
pub fn parse(input: &str, max_index: usize) -> Selection {
    let trimmed = input.trim();
    let upper = trimmed.to_uppercase();

    if upper == "CAB" {
        return Selection::Cancel;
    }
    if upper == "ALL" {
        return Selection::Indices((1..=max_index).collect());
    }
    if let Some(name) = create_name(trimmed) {
        return Selection::Create(name);
    }

    let mut picked = std::collections::BTreeSet::new();
    for part in upper.split(',').map(str::trim) {
        picked.extend(parse_part(part, max_index));
    }
    Selection::Indices(picked.into_iter().collect())
}

/// Extracts `<name>` from a `NEW <name>` command, keeping the original case.
fn create_name(input: &str) -> Option<String> {
    let mut parts = input.splitn(2, char::is_whitespace);
    let verb = parts.next()?;
    if !verb.eq_ignore_ascii_case("NEW") {
        return None;
    }
    let name = parts.next().map(str::trim).unwrap_or_default();
    Some(name.to_string())
}

/// Expands a single comma-separated part into its valid positions.
fn parse_part(part: &str, max_index: usize) -> Vec<usize> {
    let in_range = |i: &usize| (1..=max_index).contains(i);

    match part.split_once('-') {
        Some((start, end)) => {
            let (Ok(start), Ok(end)) = (start.trim().parse::<usize>(), end.trim().parse::<usize>())
            else {
                return Vec::new();
            };
            let (low, high) = if start > end { (end, start) } else { (start, end) };
            // Clamp before iterating so a huge range like 1-999999999 stays cheap.
            let high = high.min(max_index);
            (low..=high).filter(in_range).collect()
        },
        None => part
            .parse::<usize>()
            .ok()
            .filter(in_range)
            .into_iter()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(250)]
    fn test_cab_is_cancel_for_any_length(#[case] n: usize) {
        assert_eq!(parse("CAB", n), Selection::Cancel);
        assert_eq!(parse("  cab ", n), Selection::Cancel);
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    #[case(12)]
    fn test_all_selects_every_position(#[case] n: usize) {
        assert_eq!(parse("ALL", n), Selection::Indices((1..=n).collect()));
        assert_eq!(parse("all", n), Selection::Indices((1..=n).collect()));
    }

    #[test]
    fn test_mixed_singles_and_ranges() {
        assert_eq!(parse("1,3-5,9", 10), Selection::Indices(vec![1, 3, 4, 5, 9]));
    }

    #[test]
    fn test_inverted_range_is_normalized() {
        assert_eq!(parse("5-2", 10), Selection::Indices(vec![2, 3, 4, 5]));
    }

    #[test]
    fn test_invalid_tokens_are_dropped() {
        assert_eq!(parse("1,99,abc", 10), Selection::Indices(vec![1]));
        assert_eq!(parse("0", 10), Selection::Indices(vec![]));
        assert_eq!(parse("x-3", 10), Selection::Indices(vec![]));
        assert_eq!(parse("1-2-3", 10), Selection::Indices(vec![]));
    }

    #[test]
    fn test_duplicates_and_whitespace() {
        assert_eq!(
            parse(" 3 , 1-3 ,2 ", 5),
            Selection::Indices(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_range_partially_out_of_bounds_keeps_valid_part() {
        assert_eq!(parse("4-8", 5), Selection::Indices(vec![4, 5]));
        assert_eq!(parse("1-999999999", 3), Selection::Indices(vec![1, 2, 3]));
    }

    #[test]
    fn test_empty_input_yields_empty_set() {
        assert_eq!(parse("", 3), Selection::Indices(vec![]));
        assert_eq!(parse("ALL", 0), Selection::Indices(vec![]));
    }

    #[test]
    fn test_new_keeps_name_case() {
        assert_eq!(parse("NEW Orders", 3), Selection::Create("Orders".to_string()));
        assert_eq!(parse("new  my kind ", 3), Selection::Create("my kind".to_string()));
        assert_eq!(parse("NEW", 3), Selection::Create(String::new()));
        assert_eq!(parse("NEWS", 3), Selection::Indices(vec![]));
    }

    #[test]
    fn test_positions_expands_all() {
        assert_eq!(Selection::All.positions(3), vec![1, 2, 3]);
        assert_eq!(Selection::Indices(vec![2]).positions(3), vec![2]);
        assert!(Selection::Cancel.positions(3).is_empty());
    }
}
