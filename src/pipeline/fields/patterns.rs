//! Compiled pattern tables for detail-fragment parsing.

use std::sync::LazyLock;

use regex::Regex;

/// Numeric operand: integer or decimal.
const VALUE: &str = r"\d+(?:\.\d+)?";

/// Earned operand: a number, or `*` for "not graded yet".
const EARNED: &str = r"(\*|\d+(?:\.\d+)?)";

/// `/` or `out of` between earned and total.
const SEPARATOR: &str = r"\s*(?:/|out\s+of)\s*";

/// Label-anchored score patterns in priority order. Each captures
/// `(earned, total)`.
pub(super) static LABELED_SCORE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let labels = [r"points\s+earned", r"earned\s+points", r"score", r"grade"];
    let mut patterns: Vec<Regex> = labels
        .iter()
        .map(|label| {
            Regex::new(&format!(r"(?i)\b{label}\b[:\s]*{EARNED}{SEPARATOR}({VALUE})")).unwrap()
        })
        .collect();
    // Generic keyword within 50 characters of a pair.
    patterns.push(
        Regex::new(&format!(
            r"(?i)\b(?:points|earned|score)\b[\s\S]{{0,50}}?{EARNED}\s*/\s*({VALUE})"
        ))
        .unwrap(),
    );
    patterns
});

/// Pair inside a single table row.
pub(super) static ROW_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"{EARNED}\s*/\s*({VALUE})")).unwrap());

/// Any numeric pair anywhere in the fragment.
pub(super) static NUMERIC_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"({VALUE})\s*/\s*({VALUE})")).unwrap());

/// Row keywords that mark a grading row in the structural scan.
pub(super) const GRADING_KEYWORDS: [&str; 4] = ["points", "earned", "score", "grade"];

/// Labels that carry only the denominator.
pub(super) static TOTAL_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:total\s+points|max(?:imum)?\s+points|points\s+possible|out\s+of)\b[:\s]*({VALUE})"
    ))
    .unwrap()
});

pub(super) static WEIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bweight\b[^%\n]{{0,40}}?({VALUE})\s*%")).unwrap()
});

pub(super) static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"({VALUE})\s*%")).unwrap());

/// Date-shaped token following a label: `m/d[/y]`, `Mon d[, yyyy]` or ISO.
const DATE_TOKEN: &str = r"(\d{1,2}/\d{1,2}(?:/\d{2,4})?|[A-Za-z]{3,9}\.?\s+\d{1,2}(?:,?\s*\d{4})?|\d{4}-\d{2}-\d{2})";

pub(super) static DUE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bdue(?:\s+date)?\b\s*:?\s*{DATE_TOKEN}")).unwrap()
});

pub(super) static ASSIGN_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bassign(?:ed)?\b(?:\s+(?:date|on))?\s*:?\s*{DATE_TOKEN}"
    ))
    .unwrap()
});

pub(super) static DAY_MONTH_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}/\d{1,2}").unwrap());

pub(super) static FOUR_DIGIT_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}\b").unwrap());

pub(super) static MONTH_ABBREVIATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b",
    )
    .unwrap()
});
