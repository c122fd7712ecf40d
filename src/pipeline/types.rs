//! Core types for the gradebook pipeline.
//!
//! These types model one run end to end:
//! Class listing → Assignment references → Detail fragments → Records → History.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::fields::round2;

// ═══════════════════════════════════════════
// Date keys
// ═══════════════════════════════════════════

/// Calendar day used to key history series.
///
/// Serialized as `M/D/YYYY` (the format the grades snapshot has always used)
/// and ordered chronologically rather than lexically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Accepts `M/D/YYYY` and ISO `YYYY-MM-DD`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        NaiveDate::parse_from_str(s, "%m/%d/%Y")
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .ok()
            .map(Self)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%-m/%-d/%Y"))
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateKey::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date key: {raw}")))
    }
}

// ═══════════════════════════════════════════
// Composite identity
// ═══════════════════════════════════════════

/// `(assignment_id, class_id, student_id)` identity of an assignment across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    pub assignment_id: Option<String>,
    pub class_id: Option<String>,
    pub student_id: Option<String>,
}

impl CompositeKey {
    pub fn new(
        assignment_id: Option<&str>,
        class_id: Option<&str>,
        student_id: Option<&str>,
    ) -> Self {
        let clean = |part: Option<&str>| {
            part.map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
        };
        Self {
            assignment_id: clean(assignment_id),
            class_id: clean(class_id),
            student_id: clean(student_id),
        }
    }

    /// Joined cache key, or `None` when every part is empty.
    pub fn cache_key(&self) -> Option<String> {
        if self.assignment_id.is_none() && self.class_id.is_none() && self.student_id.is_none() {
            return None;
        }
        Some(format!(
            "{}|{}|{}",
            self.assignment_id.as_deref().unwrap_or(""),
            self.class_id.as_deref().unwrap_or(""),
            self.student_id.as_deref().unwrap_or(""),
        ))
    }
}

// ═══════════════════════════════════════════
// Class listing (input from provider)
// ═══════════════════════════════════════════

/// One class as it appears in the class-listing region of the gradebook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassListingEntry {
    /// Internal group identifier the gradebook uses to tie rows to this class.
    pub group_id: String,
    pub class_name: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default)]
    pub period: String,
    /// Raw grade cell text per marking period, oldest first.
    #[serde(default)]
    pub quarter_grades: Vec<Option<String>>,
    /// Set when the gradebook marks this class as part of the active period.
    #[serde(default)]
    pub highlighted: bool,
}

/// Resolved class, immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub class_id: String,
    pub class_name: String,
    pub teacher: String,
    pub period: String,
    #[serde(default)]
    pub quarter_grades: Vec<Option<f64>>,
    #[serde(default)]
    pub highlighted: bool,
    pub current_grade: Option<f64>,
}

impl ClassDescriptor {
    pub fn from_listing(entry: &ClassListingEntry) -> Self {
        let quarter_grades: Vec<Option<f64>> = entry
            .quarter_grades
            .iter()
            .map(|cell| cell.as_deref().and_then(parse_grade_cell))
            .collect();
        let current_grade = resolve_current_grade(&quarter_grades, entry.highlighted);
        Self {
            class_id: entry.group_id.trim().to_string(),
            class_name: entry.class_name.trim().to_string(),
            teacher: entry.teacher.trim().to_string(),
            period: entry.period.trim().to_string(),
            quarter_grades,
            highlighted: entry.highlighted,
            current_grade,
        }
    }

    /// Last-resort descriptor that displays the raw identifier.
    pub fn unresolved(raw_class_id: Option<&str>) -> Self {
        let raw = raw_class_id.map(str::trim).filter(|id| !id.is_empty());
        Self {
            class_id: raw.unwrap_or_default().to_string(),
            class_name: raw.unwrap_or("Unknown").to_string(),
            teacher: String::new(),
            period: String::new(),
            quarter_grades: Vec::new(),
            highlighted: false,
            current_grade: None,
        }
    }
}

/// Parse a gradebook grade cell such as `"92"`, `"87.5%"` or `" 100 % "`.
/// Anything outside 0–100 is not a grade.
pub fn parse_grade_cell(cell: &str) -> Option<f64> {
    let cleaned: String = cell.chars().filter(|c| *c != '%' && !c.is_whitespace()).collect();
    let grade: f64 = cleaned.parse().ok()?;
    (grade.is_finite() && (0.0..=100.0).contains(&grade)).then_some(grade)
}

/// Most recent populated quarter wins. A highlighted class with nothing
/// posted yet counts as 0 so it still shows up as in progress.
pub fn resolve_current_grade(quarter_grades: &[Option<f64>], highlighted: bool) -> Option<f64> {
    quarter_grades
        .iter()
        .rev()
        .find_map(|g| *g)
        .or(if highlighted { Some(0.0) } else { None })
}

// ═══════════════════════════════════════════
// Assignment references and detail fragments
// ═══════════════════════════════════════════

/// A visible assignment link in the gradebook, as enumerated by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentRef {
    /// Position in the provider's enumeration; stable for the run.
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub assignment_id: Option<String>,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    pub name: String,
    /// Raw due-date label text from the assignment row.
    #[serde(default)]
    pub due_label: Option<String>,
    /// Explicit group attribute carried by the assignment row, when present.
    #[serde(default)]
    pub group_hint: Option<String>,
}

impl AssignmentRef {
    pub fn composite_key(&self) -> CompositeKey {
        CompositeKey::new(
            self.assignment_id.as_deref(),
            self.class_id.as_deref(),
            self.student_id.as_deref(),
        )
    }
}

/// One table row inside a detail fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub cells: Vec<String>,
}

impl DetailRow {
    pub fn text(&self) -> String {
        self.cells
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Visible content of an opened assignment detail view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailFragment {
    pub text: String,
    #[serde(default)]
    pub rows: Vec<DetailRow>,
}

/// Ways of dismissing the detail view, in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissAction {
    CloseButton,
    OkButton,
    CloseLink,
    CloseIcon,
    /// Keyboard cancel, the fallback when no control is found.
    Escape,
}

impl DismissAction {
    pub fn sequence() -> &'static [DismissAction] {
        &[
            Self::CloseButton,
            Self::OkButton,
            Self::CloseLink,
            Self::CloseIcon,
            Self::Escape,
        ]
    }
}

// ═══════════════════════════════════════════
// Field extraction output
// ═══════════════════════════════════════════

/// Which heuristic resolved the earned/total pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Label,
    TableRow,
    Generic,
    Percentage,
}

/// Best-effort fields read from one detail fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldExtraction {
    pub earned_points: Option<f64>,
    pub total_points: Option<f64>,
    pub weight: Option<f64>,
    pub date_due: Option<String>,
    pub assign_date: Option<String>,
    pub graded: bool,
    pub has_star: bool,
    pub source: Option<ScoreSource>,
}

impl FieldExtraction {
    /// Result when nothing could be read.
    pub fn ungraded() -> Self {
        Self {
            earned_points: Some(0.0),
            total_points: None,
            weight: None,
            date_due: None,
            assign_date: None,
            graded: false,
            has_star: false,
            source: None,
        }
    }
}

// ═══════════════════════════════════════════
// Assignment records
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub assignment_id: Option<String>,
    pub class_id: Option<String>,
    pub student_id: Option<String>,
    pub name: String,
    pub due_date: Option<String>,
    pub assign_date: Option<String>,
    pub earned_points: f64,
    pub total_points: Option<f64>,
    pub weight: Option<f64>,
    pub graded: bool,
}

impl AssignmentRecord {
    /// Build a record from a reference and what was read from its detail view.
    /// A zero total is never a valid denominator and is stored as `None`.
    pub fn from_extraction(
        reference: &AssignmentRef,
        fields: &FieldExtraction,
        fallback_due: Option<String>,
    ) -> Self {
        let key = reference.composite_key();
        Self {
            assignment_id: key.assignment_id,
            class_id: key.class_id,
            student_id: key.student_id,
            name: reference.name.trim().to_string(),
            due_date: fields.date_due.clone().or(fallback_due),
            assign_date: fields.assign_date.clone(),
            earned_points: if fields.graded {
                fields.earned_points.unwrap_or(0.0)
            } else {
                0.0
            },
            total_points: normalize_total(fields.total_points),
            weight: fields.weight,
            graded: fields.graded,
        }
    }

    pub fn composite_key(&self) -> CompositeKey {
        CompositeKey::new(
            self.assignment_id.as_deref(),
            self.class_id.as_deref(),
            self.student_id.as_deref(),
        )
    }

    /// Earned over total as a percentage, when both are known.
    pub fn percentage(&self) -> Option<f64> {
        let total = self.total_points?;
        self.graded.then(|| self.earned_points / total * 100.0)
    }
}

pub fn normalize_total(total: Option<f64>) -> Option<f64> {
    total.filter(|t| t.is_finite() && *t != 0.0)
}

/// Records for one resolved class, in enumeration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassAssignments {
    pub class_name: String,
    pub teacher: String,
    pub period: String,
    pub current_grade: Option<f64>,
    pub assignments: Vec<AssignmentRecord>,
}

impl ClassAssignments {
    /// Mean score over graded assignments that carry a total, in percent.
    pub fn average_percentage(&self) -> Option<f64> {
        let scores: Vec<f64> = self
            .assignments
            .iter()
            .filter_map(AssignmentRecord::percentage)
            .collect();
        if scores.is_empty() {
            return None;
        }
        Some(round2(scores.iter().sum::<f64>() / scores.len() as f64))
    }
}

// ═══════════════════════════════════════════
// Missing assignments
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingAssignment {
    pub due_date: String,
    pub assignment_name: String,
    pub class_name: String,
    pub teacher: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_points: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absent: Option<String>,
}

// ═══════════════════════════════════════════
// Letter grades
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    pub fn from_percent(grade: f64) -> Self {
        if grade >= 90.0 {
            Self::A
        } else if grade >= 80.0 {
            Self::B
        } else if grade >= 70.0 {
            Self::C
        } else if grade >= 60.0 {
            Self::D
        } else {
            Self::F
        }
    }

    /// Leading letter of a displayed grade such as `A-` or `b+`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().chars().next()?.to_ascii_uppercase() {
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            'C' => Some(Self::C),
            'D' => Some(Self::D),
            'F' => Some(Self::F),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Run statistics
// ═══════════════════════════════════════════

/// Counters for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub visited: u32,
    pub skipped_by_cap: u32,
    pub cache_hits: u32,
    pub extracted: u32,
    pub graded: u32,
    pub ungraded: u32,
    pub failures: u32,
    pub timeouts: u32,
    pub evicted: u32,
    pub unresolved_classes: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_key_formats_without_padding() {
        let key = DateKey::new(NaiveDate::from_ymd_opt(2026, 3, 7).unwrap());
        assert_eq!(key.to_string(), "3/7/2026");
    }

    #[test]
    fn date_key_parses_both_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 11, 4).unwrap();
        assert_eq!(DateKey::parse("11/4/2025").unwrap().date(), expected);
        assert_eq!(DateKey::parse("2025-11-04").unwrap().date(), expected);
        assert!(DateKey::parse("yesterday").is_none());
    }

    #[test]
    fn date_keys_order_chronologically() {
        let dec = DateKey::parse("12/31/2025").unwrap();
        let jan = DateKey::parse("1/2/2026").unwrap();
        assert!(dec < jan, "lexical order would put 1/2 first");
    }

    #[test]
    fn date_key_json_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(DateKey::parse("2/9/2026").unwrap(), 88u32);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"2/9/2026":88}"#);
        let back: std::collections::BTreeMap<DateKey, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn composite_key_joins_parts() {
        let key = CompositeKey::new(Some("101"), Some("1396_35985"), Some("77"));
        assert_eq!(key.cache_key().as_deref(), Some("101|1396_35985|77"));
    }

    #[test]
    fn composite_key_allows_missing_parts() {
        let key = CompositeKey::new(Some("101"), None, Some("  "));
        assert_eq!(key.cache_key().as_deref(), Some("101||"));
    }

    #[test]
    fn empty_composite_key_does_not_participate() {
        assert!(CompositeKey::new(None, Some(""), None).cache_key().is_none());
    }

    #[test]
    fn grade_cells_parse_with_percent_and_reject_noise() {
        assert_eq!(parse_grade_cell("92"), Some(92.0));
        assert_eq!(parse_grade_cell(" 87.5 % "), Some(87.5));
        assert_eq!(parse_grade_cell("101"), None);
        assert_eq!(parse_grade_cell("A"), None);
        assert_eq!(parse_grade_cell(""), None);
    }

    #[test]
    fn latest_quarter_wins() {
        assert_eq!(resolve_current_grade(&[Some(80.0), Some(85.0), None], false), Some(85.0));
        assert_eq!(resolve_current_grade(&[Some(80.0), Some(85.0), Some(91.0)], false), Some(91.0));
    }

    #[test]
    fn highlighted_class_without_grade_counts_as_zero() {
        assert_eq!(resolve_current_grade(&[None, None, None], true), Some(0.0));
        assert_eq!(resolve_current_grade(&[None, None, None], false), None);
    }

    #[test]
    fn descriptor_from_listing_trims_and_resolves() {
        let entry = ClassListingEntry {
            group_id: " 1396_35985_0_20 ".into(),
            class_name: "ALGEBRA II ".into(),
            teacher: "Rivera, Ana".into(),
            period: "3".into(),
            quarter_grades: vec![Some("88%".into()), None, None],
            highlighted: true,
        };
        let class = ClassDescriptor::from_listing(&entry);
        assert_eq!(class.class_id, "1396_35985_0_20");
        assert_eq!(class.class_name, "ALGEBRA II");
        assert_eq!(class.current_grade, Some(88.0));
    }

    #[test]
    fn unresolved_descriptor_uses_raw_id() {
        let class = ClassDescriptor::unresolved(Some("9999_1"));
        assert_eq!(class.class_name, "9999_1");
        assert!(class.teacher.is_empty());
        assert_eq!(ClassDescriptor::unresolved(None).class_name, "Unknown");
    }

    #[test]
    fn record_never_keeps_zero_total() {
        let reference = AssignmentRef {
            index: 0,
            assignment_id: Some("1".into()),
            name: "Quiz 1".into(),
            ..Default::default()
        };
        let fields = FieldExtraction {
            earned_points: Some(5.0),
            total_points: Some(0.0),
            graded: true,
            ..FieldExtraction::ungraded()
        };
        let record = AssignmentRecord::from_extraction(&reference, &fields, None);
        assert_eq!(record.total_points, None);
        assert_eq!(record.earned_points, 5.0);
    }

    #[test]
    fn ungraded_record_has_zero_earned() {
        let reference = AssignmentRef {
            name: "Lab".into(),
            ..Default::default()
        };
        let fields = FieldExtraction {
            earned_points: Some(12.0),
            total_points: Some(20.0),
            graded: false,
            has_star: true,
            ..FieldExtraction::ungraded()
        };
        let record =
            AssignmentRecord::from_extraction(&reference, &fields, Some("10/2/2025".into()));
        assert_eq!(record.earned_points, 0.0);
        assert!(!record.graded);
        assert_eq!(record.due_date.as_deref(), Some("10/2/2025"));
        assert!(record.percentage().is_none());
    }

    #[test]
    fn letter_grade_thresholds() {
        assert_eq!(LetterGrade::from_percent(90.0), LetterGrade::A);
        assert_eq!(LetterGrade::from_percent(89.99), LetterGrade::B);
        assert_eq!(LetterGrade::from_percent(70.0), LetterGrade::C);
        assert_eq!(LetterGrade::from_percent(60.0), LetterGrade::D);
        assert_eq!(LetterGrade::from_percent(0.0), LetterGrade::F);
    }

    #[test]
    fn letter_grade_parse_takes_leading_letter() {
        assert_eq!(LetterGrade::parse("A-"), Some(LetterGrade::A));
        assert_eq!(LetterGrade::parse(" b+"), Some(LetterGrade::B));
        assert_eq!(LetterGrade::parse("E"), None);
        assert_eq!(LetterGrade::parse(""), None);
    }

    #[test]
    fn class_average_skips_ungraded_and_totalless() {
        let record = |earned: f64, total: Option<f64>, graded: bool| AssignmentRecord {
            assignment_id: None,
            class_id: None,
            student_id: None,
            name: "Quiz".into(),
            due_date: None,
            assign_date: None,
            earned_points: earned,
            total_points: total,
            weight: None,
            graded,
        };
        let class = ClassAssignments {
            class_name: "Algebra".into(),
            teacher: String::new(),
            period: "1".into(),
            current_grade: Some(88.0),
            assignments: vec![
                record(9.0, Some(10.0), true),
                record(40.0, Some(50.0), true),
                record(0.0, Some(20.0), false),
                record(7.0, None, true),
            ],
        };
        assert_eq!(class.average_percentage(), Some(85.0));

        let empty = ClassAssignments {
            assignments: Vec::new(),
            ..class
        };
        assert_eq!(empty.average_percentage(), None);
    }
}
