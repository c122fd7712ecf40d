//! Grade-impact projection for a hypothetical assignment.

use serde::Serialize;

use super::error::{InputProblem, ProjectionError};
use super::fields::round2;
use super::types::{AssignmentRecord, LetterGrade};

const MAX_INPUT_POINTS: f64 = 10_000.0;

/// Changes smaller than this are reported as neither improvement nor decline.
const SIGNIFICANT_DELTA: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hypothetical {
    pub earned: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeImpact {
    pub current_grade: f64,
    pub projected_grade: f64,
    pub delta: f64,
    pub current_letter: LetterGrade,
    pub projected_letter: LetterGrade,
    pub is_improvement: bool,
    pub is_decline: bool,
}

pub fn validate(hypothetical: &Hypothetical) -> Result<(), ProjectionError> {
    let Hypothetical { earned, max } = *hypothetical;
    let mut problems = Vec::new();
    if earned < 0.0 {
        problems.push(InputProblem::NegativeScore);
    }
    if max <= 0.0 {
        problems.push(InputProblem::NonPositiveMax);
    }
    if earned > MAX_INPUT_POINTS || max > MAX_INPUT_POINTS {
        problems.push(InputProblem::ExceedsLimit);
    }
    if !earned.is_finite() || !max.is_finite() {
        problems.push(InputProblem::NotFinite);
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ProjectionError::InvalidInput(problems))
    }
}

/// Project the class grade after adding `hypothetical`.
///
/// Uses the graded assignments' point totals when any carry a total;
/// otherwise treats `current_grade` as points out of 100.
pub fn project_grade_impact(
    current_grade: f64,
    hypothetical: &Hypothetical,
    assignments: &[AssignmentRecord],
) -> Result<GradeImpact, ProjectionError> {
    validate(hypothetical)?;

    let (earned, possible) = assignments
        .iter()
        .filter(|a| a.graded)
        .filter_map(|a| a.total_points.map(|total| (a.earned_points, total)))
        .fold((0.0, 0.0), |(e, p), (earned, total)| (e + earned, p + total));

    let (base_earned, base_possible) = if possible > 0.0 {
        (earned, possible)
    } else {
        (current_grade, 100.0)
    };

    let projected = ((base_earned + hypothetical.earned) / (base_possible + hypothetical.max)
        * 100.0)
        .min(100.0);
    let delta = projected - current_grade;

    Ok(GradeImpact {
        current_grade,
        projected_grade: round2(projected),
        delta: round2(delta),
        current_letter: LetterGrade::from_percent(current_grade),
        projected_letter: LetterGrade::from_percent(projected),
        is_improvement: delta > SIGNIFICANT_DELTA,
        is_decline: delta < -SIGNIFICANT_DELTA,
    })
}
