//! Field extraction from assignment detail fragments.
//!
//! Turns the visible text and table rows of one detail view into a
//! best-effort [`FieldExtraction`]. Never fails: anything unreadable comes
//! back as an ungraded zero-point result.

mod dates;
mod patterns;
mod score;

pub use dates::{looks_like_date, normalize_date_label};

use crate::pipeline::types::{normalize_total, DetailFragment, FieldExtraction, ScoreSource};
use score::Earned;

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Extract score, weight and dates from a detail fragment.
pub fn extract_fields(fragment: &DetailFragment) -> FieldExtraction {
    let text = searchable_text(fragment);
    let weight = score::weight(&text);

    let mut out = FieldExtraction::ungraded();
    out.weight = weight.as_ref().map(|w| w.value);
    out.date_due = dates::due_date(&text, &fragment.rows);
    out.assign_date = dates::assign_date(&text, &fragment.rows);

    let mut earned = None;
    let total = match score::first_pair(&text, &fragment.rows) {
        Some((source, pair)) => {
            out.source = Some(source);
            match pair.earned {
                Earned::Star => out.has_star = true,
                Earned::Points(points) => earned = Some(points),
            }
            normalize_total(Some(pair.total))
        }
        None => score::total_only(&text),
    };

    if let (false, Some(total)) = (out.has_star, total) {
        let markers = score::percent_markers(&text, weight.as_ref().map(|w| &w.span));
        let percent = match earned {
            None => markers.first().copied(),
            Some(points) if points == 0.0 => markers.iter().copied().find(|p| *p > 0.0),
            Some(_) => None,
        };
        if let Some(percent) = percent {
            earned = Some(round2(percent / 100.0 * total));
            out.source = Some(ScoreSource::Percentage);
        }
    }

    out.total_points = total;
    if let (false, Some(points)) = (out.has_star, earned) {
        out.earned_points = Some(points);
        out.graded = true;
    }

    tracing::debug!(
        graded = out.graded,
        star = out.has_star,
        source = ?out.source,
        "Detail fields extracted"
    );
    out
}

/// Fragment text with non-breaking spaces flattened. Falls back to the
/// table rows when the fragment carries no free text.
fn searchable_text(fragment: &DetailFragment) -> String {
    let text = if fragment.text.trim().is_empty() {
        fragment
            .rows
            .iter()
            .map(|r| r.text())
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        fragment.text.clone()
    };
    text.replace('\u{a0}', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::DetailRow;

    fn fragment(text: &str) -> DetailFragment {
        DetailFragment {
            text: text.to_string(),
            rows: Vec::new(),
        }
    }

    #[test]
    fn labeled_score_is_graded() {
        let out = extract_fields(&fragment("Points Earned: 18/20\nWeight: 10%"));
        assert!(out.graded);
        assert_eq!(out.earned_points, Some(18.0));
        assert_eq!(out.total_points, Some(20.0));
        assert_eq!(out.weight, Some(10.0));
        assert_eq!(out.source, Some(ScoreSource::Label));
    }

    #[test]
    fn year_noise_does_not_beat_real_pair() {
        let out = extract_fields(&fragment("School year 2024 quiz results 87/100 recorded"));
        assert!(out.graded);
        assert_eq!(out.earned_points, Some(87.0));
        assert_eq!(out.total_points, Some(100.0));
    }

    #[test]
    fn star_means_not_graded() {
        let out = extract_fields(&fragment("Score: */50 85%"));
        assert!(!out.graded);
        assert!(out.has_star);
        assert_eq!(out.earned_points, Some(0.0));
        assert_eq!(out.total_points, Some(50.0));
    }

    #[test]
    fn percent_fallback_with_total_only() {
        let out = extract_fields(&fragment("Max Points: 40\nPercent: 75%"));
        assert!(out.graded);
        assert_eq!(out.earned_points, Some(30.0));
        assert_eq!(out.total_points, Some(40.0));
        assert_eq!(out.source, Some(ScoreSource::Percentage));
    }

    #[test]
    fn percent_fallback_replaces_zero_earned() {
        let out = extract_fields(&fragment("Score: 0/30 (90%)"));
        assert_eq!(out.earned_points, Some(27.0));
        assert!(out.graded);
    }

    #[test]
    fn percent_fallback_ignores_weight_clause() {
        let out = extract_fields(&fragment("Max Points: 40\nWeight: 25%"));
        assert!(!out.graded);
        assert_eq!(out.earned_points, Some(0.0));
        assert_eq!(out.total_points, Some(40.0));
        assert_eq!(out.weight, Some(25.0));
    }

    #[test]
    fn zero_total_becomes_none() {
        let out = extract_fields(&fragment("Points Earned: 5/0"));
        assert_eq!(out.total_points, None);
        assert_eq!(out.earned_points, Some(5.0));
    }

    #[test]
    fn empty_fragment_is_ungraded() {
        let out = extract_fields(&fragment("  "));
        assert_eq!(out, FieldExtraction::ungraded());
    }

    #[test]
    fn rows_only_fragment() {
        let frag = DetailFragment {
            text: String::new(),
            rows: vec![
                DetailRow {
                    cells: vec!["Due Date".into(), "12/5/2025".into()],
                },
                DetailRow {
                    cells: vec!["Points".into(), "9/10".into()],
                },
            ],
        };
        let out = extract_fields(&frag);
        assert!(out.graded);
        assert_eq!(out.earned_points, Some(9.0));
        assert_eq!(out.date_due.as_deref(), Some("12/5/2025"));
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(round2(2.0 / 3.0), 0.67);
    }
}
