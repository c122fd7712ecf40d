//! Due and assigned dates from a detail fragment.

use regex::Regex;

use super::patterns::{
    ASSIGN_LABEL, DAY_MONTH_PAIR, DUE_LABEL, FOUR_DIGIT_YEAR, MONTH_ABBREVIATION,
};
use crate::pipeline::types::DetailRow;

pub(super) fn due_date(text: &str, rows: &[DetailRow]) -> Option<String> {
    labeled_row_date(rows, |label| label.contains("due"))
        .or_else(|| labeled_text_date(&DUE_LABEL, text))
}

pub(super) fn assign_date(text: &str, rows: &[DetailRow]) -> Option<String> {
    labeled_row_date(rows, |label| {
        label.contains("assign") && (label.contains("date") || label.starts_with("assigned"))
    })
    .or_else(|| labeled_text_date(&ASSIGN_LABEL, text))
}

/// A two-column `Label | value` row whose label satisfies `is_label`.
fn labeled_row_date(rows: &[DetailRow], is_label: impl Fn(&str) -> bool) -> Option<String> {
    rows.iter().find_map(|row| {
        let (label, values) = row.cells.split_first()?;
        let label = label.trim().trim_end_matches(':').to_lowercase();
        if !is_label(&label) {
            return None;
        }
        values.iter().find_map(|cell| normalize_date_label(cell))
    })
}

fn labeled_text_date(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| normalize_date_label(m.as_str()))
}

/// Accept a token as a date only if it has a `d/d` pair, a 4-digit year, or
/// a month name. Bare numbers such as `15` or `2025` are rejected.
pub fn looks_like_date(token: &str) -> bool {
    let token = token.trim();
    let bare_number = token
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c.is_whitespace());
    if token.is_empty() || bare_number {
        return false;
    }
    DAY_MONTH_PAIR.is_match(token)
        || FOUR_DIGIT_YEAR.is_match(token)
        || MONTH_ABBREVIATION.is_match(token)
}

/// Collapse whitespace (including non-breaking spaces) and keep the label
/// only when it reads as a date.
pub fn normalize_date_label(raw: &str) -> Option<String> {
    let cleaned = raw
        .replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    looks_like_date(&cleaned).then_some(cleaned)
}
