//! Missing-assignment table parsing.
//!
//! Rows come from the gradebook's missing-assignments view with columns
//! `Due | Assignment | Class | Teacher | Category | Max Points | Absent`;
//! the last three are optional.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::types::MissingAssignment;

const MIN_CELLS: usize = 4;

static SLASH_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+/\d+/\d+").unwrap());

static PERIOD_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\(Q\d+\)").unwrap());

/// Parse table rows into deduplicated missing assignments, in row order.
pub fn parse_missing_rows(
    rows: &[Vec<String>],
    marking_period: Option<&str>,
) -> Vec<MissingAssignment> {
    let period = marking_period.map(|p| p.trim().to_lowercase()).filter(|p| !p.is_empty());
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for cells in rows {
        if cells.len() < MIN_CELLS {
            continue;
        }
        let cell = |i: usize| cells.get(i).map(|c| c.trim()).unwrap_or_default();
        let (due_raw, name, class_name, teacher) = (cell(0), cell(1), cell(2), cell(3));

        if due_raw.is_empty() || name.is_empty() || class_name.is_empty() {
            continue;
        }
        if is_header(due_raw) || is_header(name) {
            continue;
        }
        if !SLASH_DATE.is_match(due_raw) && !due_raw.contains('Q') {
            continue;
        }
        if let Some(period) = &period {
            if !due_raw.to_lowercase().contains(period.as_str()) {
                continue;
            }
        }

        let due_date = normalize_due(due_raw);
        if !seen.insert((due_date.clone(), class_name.to_string(), name.to_string())) {
            tracing::debug!(
                assignment = name,
                class = class_name,
                "Dropping duplicate missing row"
            );
            continue;
        }

        let optional = |i: usize| Some(cell(i)).filter(|c| !c.is_empty()).map(str::to_string);
        out.push(MissingAssignment {
            due_date,
            assignment_name: name.to_string(),
            class_name: class_name.to_string(),
            teacher: teacher.to_string(),
            category: optional(4),
            max_points: optional(5),
            absent: optional(6),
        });
    }
    out
}

fn is_header(cell: &str) -> bool {
    cell.to_lowercase().contains("due")
}

fn normalize_due(raw: &str) -> String {
    let flattened = raw.replace('\u{a0}', " ");
    PERIOD_SUFFIX.replace(&flattened, "").trim().to_string()
}
