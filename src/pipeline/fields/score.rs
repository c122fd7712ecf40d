//! Earned/total resolution for a detail fragment.
//!
//! Strategies run in priority order and the first pair found wins. Pairs that
//! are really the `m/d` part of a calendar date are skipped by every strategy.

use std::ops::Range;

use regex::Regex;

use super::patterns::{
    GRADING_KEYWORDS, LABELED_SCORE, NUMERIC_PAIR, PERCENT, ROW_PAIR, TOTAL_ONLY, WEIGHT,
};
use crate::pipeline::types::{DetailRow, ScoreSource};

/// Generic pairs at or above this bound are treated as noise.
const GENERIC_OPERAND_LIMIT: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Earned {
    Points(f64),
    /// The gradebook shows `*` while an assignment is not graded yet.
    Star,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct ScorePair {
    pub earned: Earned,
    pub total: f64,
}

type ScoreStrategy = fn(&str, &[DetailRow]) -> Option<ScorePair>;

const SCORE_STRATEGIES: &[(ScoreSource, ScoreStrategy)] = &[
    (ScoreSource::Label, labeled_pair as ScoreStrategy),
    (ScoreSource::TableRow, row_pair as ScoreStrategy),
    (ScoreSource::Generic, generic_pair as ScoreStrategy),
];

/// First pair any strategy resolves, with the strategy that found it.
pub(super) fn first_pair(text: &str, rows: &[DetailRow]) -> Option<(ScoreSource, ScorePair)> {
    SCORE_STRATEGIES
        .iter()
        .find_map(|(source, strategy)| strategy(text, rows).map(|pair| (*source, pair)))
}

fn labeled_pair(text: &str, _rows: &[DetailRow]) -> Option<ScorePair> {
    LABELED_SCORE
        .iter()
        .find_map(|pattern| first_valid_pair(pattern, text, |_| true))
}

fn row_pair(_text: &str, rows: &[DetailRow]) -> Option<ScorePair> {
    rows.iter().find_map(|row| {
        let line = row.text();
        let lower = line.to_lowercase();
        if !GRADING_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return None;
        }
        first_valid_pair(&ROW_PAIR, &line, |_| true)
    })
}

fn generic_pair(text: &str, _rows: &[DetailRow]) -> Option<ScorePair> {
    first_valid_pair(&NUMERIC_PAIR, text, |pair| {
        let earned_ok = matches!(pair.earned, Earned::Points(e) if e < GENERIC_OPERAND_LIMIT);
        earned_ok && pair.total > 0.0 && pair.total < GENERIC_OPERAND_LIMIT
    })
}

/// Walk matches of a two-group pattern and return the first acceptable pair.
fn first_valid_pair(
    pattern: &Regex,
    text: &str,
    accept: impl Fn(&ScorePair) -> bool,
) -> Option<ScorePair> {
    pattern.captures_iter(text).find_map(|caps| {
        let earned = caps.get(1)?;
        let total = caps.get(2)?;
        if is_date_fragment(text, earned.start(), total.end()) {
            return None;
        }
        let pair = ScorePair {
            earned: parse_earned(earned.as_str())?,
            total: total.as_str().parse().ok()?,
        };
        accept(&pair).then_some(pair)
    })
}

fn parse_earned(raw: &str) -> Option<Earned> {
    if raw == "*" {
        return Some(Earned::Star);
    }
    raw.parse().ok().map(Earned::Points)
}

/// `10/15` inside `10/15/2025` or `/15/20` inside a longer slash run.
fn is_date_fragment(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let mut after = text[end..].chars();
    let slash_after = after.next() == Some('/') && after.next().is_some_and(|c| c.is_ascii_digit());
    before == Some('/') || slash_after
}

/// Denominator from a total-only label such as `Max Points: 40`.
pub(super) fn total_only(text: &str) -> Option<f64> {
    TOTAL_ONLY
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .find(|total| *total > 0.0)
}

pub(super) struct WeightClause {
    pub value: f64,
    pub span: Range<usize>,
}

pub(super) fn weight(text: &str) -> Option<WeightClause> {
    WEIGHT.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let value = caps.get(1)?.as_str().parse().ok()?;
        Some(WeightClause {
            value,
            span: whole.range(),
        })
    })
}

/// Percent markers in document order, ignoring any inside the weight clause.
pub(super) fn percent_markers(text: &str, excluded: Option<&Range<usize>>) -> Vec<f64> {
    PERCENT
        .captures_iter(text)
        .filter_map(|caps| {
            let marker = caps.get(0)?;
            if excluded.is_some_and(|span| span.contains(&marker.start())) {
                return None;
            }
            caps.get(1)?.as_str().parse().ok()
        })
        .collect()
}
