//! Metrics engine: merges one day's class snapshot into history series.
//!
//! Merges are append-only per date. Writing a day touches exactly one slot
//! in each series, so re-running the same day is idempotent and earlier
//! days are never recomputed.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::types::{ClassDescriptor, DateKey, LetterGrade, MissingAssignment};

/// Longitudinal series persisted in the grades snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySeries {
    #[serde(default, deserialize_with = "skip_empty_slots")]
    pub grade_history: BTreeMap<String, BTreeMap<DateKey, f64>>,
    #[serde(default)]
    pub average_history: BTreeMap<DateKey, u32>,
    #[serde(default)]
    pub streak_history: BTreeMap<DateKey, u32>,
}

/// Older snapshots hold `null` for days a class had no grade.
fn skip_empty_slots<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, BTreeMap<DateKey, f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, BTreeMap<DateKey, Option<f64>>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(class, slots)| {
            let slots = slots
                .into_iter()
                .filter_map(|(date, grade)| grade.map(|g| (date, g)))
                .collect();
            (class, slots)
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterGrade {
    pub quarter: String,
    pub grade: Option<f64>,
    pub letter: Option<LetterGrade>,
}

/// Class as reported in the grades snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredClass")]
pub struct GradedClass {
    pub class_name: String,
    pub teacher: String,
    pub period: String,
    #[serde(default)]
    pub quarters: Vec<QuarterGrade>,
    pub current_grade: Option<f64>,
    pub letter_grade: Option<LetterGrade>,
}

impl GradedClass {
    pub fn from_descriptor(class: &ClassDescriptor) -> Self {
        let quarters = class
            .quarter_grades
            .iter()
            .enumerate()
            .map(|(i, grade)| QuarterGrade {
                quarter: format!("Q{}", i + 1),
                grade: *grade,
                letter: grade.map(LetterGrade::from_percent),
            })
            .collect();
        Self {
            class_name: normalize_class_name(&class.class_name),
            teacher: class.teacher.clone(),
            period: class.period.clone(),
            quarters,
            current_grade: class.current_grade,
            letter_grade: class.current_grade.map(LetterGrade::from_percent),
        }
    }
}

/// Any class shape found on disk, including the flat `q1_grade` /
/// `q1_letter_grade` layout of older snapshots.
#[derive(Deserialize)]
struct StoredClass {
    #[serde(default)]
    class_name: String,
    #[serde(default)]
    teacher: Option<String>,
    #[serde(default)]
    period: Option<String>,
    #[serde(default)]
    quarters: Vec<QuarterGrade>,
    #[serde(default)]
    q1_grade: Option<f64>,
    #[serde(default)]
    q2_grade: Option<f64>,
    #[serde(default)]
    q3_grade: Option<f64>,
    #[serde(default)]
    q4_grade: Option<f64>,
    #[serde(default)]
    current_grade: Option<f64>,
    #[serde(default)]
    letter_grade: Option<String>,
}

impl From<StoredClass> for GradedClass {
    fn from(stored: StoredClass) -> Self {
        let quarters = if stored.quarters.is_empty() {
            let mut flat = vec![stored.q1_grade, stored.q2_grade, stored.q3_grade, stored.q4_grade];
            while flat.last() == Some(&None) {
                flat.pop();
            }
            flat.into_iter()
                .enumerate()
                .map(|(i, grade)| QuarterGrade {
                    quarter: format!("Q{}", i + 1),
                    grade,
                    letter: grade.map(LetterGrade::from_percent),
                })
                .collect()
        } else {
            stored.quarters
        };
        let letter_grade = stored
            .letter_grade
            .as_deref()
            .and_then(LetterGrade::parse)
            .or_else(|| stored.current_grade.map(LetterGrade::from_percent));
        Self {
            class_name: stored.class_name,
            teacher: stored.teacher.unwrap_or_default(),
            period: stored.period.unwrap_or_default(),
            quarters,
            current_grade: stored.current_grade,
            letter_grade,
        }
    }
}

/// Result of merging one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayMerge {
    pub series: HistorySeries,
    pub classes: Vec<GradedClass>,
    pub overall_average: u32,
    pub streak: u32,
}

/// Title case with single spaces, so `"ALGEBRA  II"` and `"algebra ii"`
/// key the same series.
pub fn normalize_class_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rounded mean of the positive current grades, 0 when there are none.
pub fn overall_average(classes: &[GradedClass]) -> u32 {
    let grades: Vec<f64> = classes
        .iter()
        .filter_map(|c| c.current_grade)
        .filter(|g| *g > 0.0)
        .collect();
    if grades.is_empty() {
        return 0;
    }
    let mean = grades.iter().sum::<f64>() / grades.len() as f64;
    mean.round() as u32
}

/// Classes currently holding an A.
pub fn a_grade_count(classes: &[GradedClass]) -> usize {
    classes
        .iter()
        .filter(|c| c.letter_grade == Some(LetterGrade::A))
        .count()
}

/// Streak for `date`: reset by any missing assignment, otherwise one more
/// than the nearest earlier recorded day.
pub fn streak_for(history: &BTreeMap<DateKey, u32>, date: DateKey, missing_today: usize) -> u32 {
    if missing_today > 0 {
        return 0;
    }
    history
        .range(..date)
        .next_back()
        .map(|(_, previous)| previous + 1)
        .unwrap_or(1)
}

/// Merge today's classes and missing list into the existing series.
pub fn merge_day(
    mut series: HistorySeries,
    classes: &[ClassDescriptor],
    missing: &[MissingAssignment],
    date: DateKey,
) -> DayMerge {
    let graded: Vec<GradedClass> = classes.iter().map(GradedClass::from_descriptor).collect();

    for class in &graded {
        if let Some(grade) = class.current_grade {
            series
                .grade_history
                .entry(class.class_name.clone())
                .or_default()
                .insert(date, grade);
        }
    }

    let average = overall_average(&graded);
    series.average_history.insert(date, average);

    let streak = streak_for(&series.streak_history, date, missing.len());
    series.streak_history.insert(date, streak);

    tracing::info!(
        date = %date,
        classes = graded.len(),
        average,
        streak,
        "Merged daily metrics"
    );

    DayMerge {
        series,
        classes: graded,
        overall_average: average,
        streak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, grade: Option<f64>) -> ClassDescriptor {
        ClassDescriptor {
            class_id: name.to_lowercase(),
            class_name: name.into(),
            teacher: "Teacher".into(),
            period: "1".into(),
            quarter_grades: vec![grade],
            highlighted: true,
            current_grade: grade,
        }
    }

    fn missing() -> MissingAssignment {
        MissingAssignment {
            due_date: "10/1/2025".into(),
            assignment_name: "Worksheet".into(),
            class_name: "Algebra".into(),
            teacher: "Teacher".into(),
            category: None,
            max_points: None,
            absent: None,
        }
    }

    fn day(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    #[test]
    fn flat_quarter_layout_still_reads() {
        let class: GradedClass = serde_json::from_str(
            r#"{"class_name": "Art", "teacher": "Moss", "period": "4",
                "q1_grade": 94, "q1_letter_grade": "A", "q2_grade": null,
                "q2_letter_grade": null, "q3_grade": null, "q3_letter_grade": null,
                "current_grade": 94, "letter_grade": "A-"}"#,
        )
        .unwrap();
        assert_eq!(class.quarters.len(), 1);
        assert_eq!(class.quarters[0].grade, Some(94.0));
        assert_eq!(class.letter_grade, Some(LetterGrade::A));
        assert_eq!(class.teacher, "Moss");
    }

    #[test]
    fn graded_class_round_trips_current_shape() {
        let original = GradedClass::from_descriptor(&class("chemistry", Some(81.5)));
        let json = serde_json::to_string(&original).unwrap();
        let back: GradedClass = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn counts_classes_holding_an_a() {
        let out = merge_day(
            HistorySeries::default(),
            &[
                class("Algebra", Some(92.0)),
                class("History", Some(78.0)),
                class("Art", Some(90.0)),
                class("Band", None),
            ],
            &[],
            day("10/6/2025"),
        );
        assert_eq!(a_grade_count(&out.classes), 2);
    }

    #[test]
    fn first_day_without_missing() {
        let today = day("10/6/2025");
        let out = merge_day(
            HistorySeries::default(),
            &[class("Algebra", Some(92.0)), class("History", Some(78.0))],
            &[],
            today,
        );
        assert_eq!(out.overall_average, 85);
        assert_eq!(out.streak, 1);
        assert_eq!(out.series.grade_history["Algebra"][&today], 92.0);
        assert_eq!(out.series.average_history[&today], 85);
        assert_eq!(out.series.streak_history[&today], 1);
        assert_eq!(out.classes[0].letter_grade, Some(LetterGrade::A));
        assert_eq!(out.classes[1].letter_grade, Some(LetterGrade::C));
    }

    #[test]
    fn missing_assignment_resets_streak() {
        let today = day("10/6/2025");
        let out = merge_day(
            HistorySeries::default(),
            &[class("Algebra", Some(92.0)), class("History", Some(78.0))],
            &[missing()],
            today,
        );
        assert_eq!(out.series.streak_history[&today], 0);
    }

    #[test]
    fn streak_increments_from_nearest_earlier_day() {
        let mut series = HistorySeries::default();
        series.streak_history.insert(day("9/30/2025"), 2);
        series.streak_history.insert(day("10/3/2025"), 4);
        let out = merge_day(series, &[], &[], day("10/6/2025"));
        assert_eq!(out.streak, 5);
    }

    #[test]
    fn streak_uses_chronological_not_lexical_order() {
        let mut series = HistorySeries::default();
        series.streak_history.insert(day("9/30/2025"), 7);
        series.streak_history.insert(day("10/1/2025"), 3);
        let out = merge_day(series, &[], &[], day("10/2/2025"));
        assert_eq!(out.streak, 4);
    }

    #[test]
    fn remerge_same_day_is_idempotent() {
        let today = day("10/6/2025");
        let classes = [class("Algebra", Some(90.0))];
        let first = merge_day(HistorySeries::default(), &classes, &[], today);
        let second = merge_day(first.series.clone(), &classes, &[], today);
        assert_eq!(first.series, second.series);
    }

    #[test]
    fn other_dates_untouched() {
        let mut series = HistorySeries::default();
        let yesterday = day("10/5/2025");
        series
            .grade_history
            .entry("Algebra".into())
            .or_default()
            .insert(yesterday, 70.0);
        series.average_history.insert(yesterday, 70);
        series.streak_history.insert(yesterday, 0);

        let out = merge_day(
            series,
            &[class("ALGEBRA", Some(95.0))],
            &[missing()],
            day("10/6/2025"),
        );
        assert_eq!(out.series.grade_history["Algebra"][&yesterday], 70.0);
        assert_eq!(out.series.average_history[&yesterday], 70);
        assert_eq!(out.series.streak_history[&yesterday], 0);
    }

    #[test]
    fn classes_without_grade_write_no_slot_and_skip_average() {
        let today = day("10/6/2025");
        let out = merge_day(
            HistorySeries::default(),
            &[class("Art", None), class("Band", Some(0.0)), class("Chem", Some(81.0))],
            &[],
            today,
        );
        assert!(!out.series.grade_history.contains_key("Art"));
        assert_eq!(out.series.grade_history["Band"][&today], 0.0);
        assert_eq!(out.overall_average, 81);
        assert_eq!(out.classes[0].letter_grade, None);
    }

    #[test]
    fn empty_day_has_zero_average() {
        let out = merge_day(HistorySeries::default(), &[], &[], day("10/6/2025"));
        assert_eq!(out.overall_average, 0);
    }

    #[test]
    fn class_names_normalize() {
        assert_eq!(normalize_class_name("  ALGEBRA   ii "), "Algebra Ii");
        assert_eq!(normalize_class_name("us history"), "Us History");
    }

    #[test]
    fn history_serializes_with_date_keys() {
        let mut series = HistorySeries::default();
        series.average_history.insert(day("10/6/2025"), 85);
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(json["average_history"]["10/6/2025"], 85);
    }
}
