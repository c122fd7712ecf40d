//! JSON snapshots written at the end of a run.
//!
//! Every write goes through a temp file in the target directory followed by
//! an atomic rename, so a crash never leaves a half-written snapshot behind.

use std::io::{ErrorKind, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tempfile::NamedTempFile;

use super::error::PipelineError;
use super::metrics::{a_grade_count, merge_day, GradedClass, HistorySeries};
use super::runner::ExtractionRun;
use super::types::{ClassAssignments, DateKey, MissingAssignment};
use crate::config::{SnapshotPaths, APP_VERSION};

// ═══════════════════════════════════════════
// Snapshot shapes
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradesMetadata {
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub most_recent_date: Option<DateKey>,
    #[serde(default)]
    pub total_classes: usize,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Read-modify-write grades snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradesSnapshot {
    #[serde(default)]
    pub metadata: GradesMetadata,
    #[serde(default)]
    pub classes: Vec<GradedClass>,
    #[serde(default)]
    pub overall_average: u32,
    #[serde(default)]
    pub streak: u32,
    /// Classes currently holding an A.
    #[serde(default)]
    pub a_grade_classes: usize,
    #[serde(flatten)]
    pub history: HistorySeries,
}

/// Older snapshots carry a locale string such as `10/06/2025, 03:15 PM`;
/// anything that is not RFC 3339 reads as unknown.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|t| t.with_timezone(&Utc))))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingMetadata {
    pub last_updated: DateTime<Utc>,
    pub count: usize,
}

/// Fully replaced each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingSnapshot {
    pub metadata: MissingMetadata,
    pub missing_assignments: Vec<MissingAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub scraped_at: DateTime<Utc>,
    pub total_classes: usize,
    pub total_assignments: usize,
}

/// Grouped-by-class assignment output of the latest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassReport {
    pub metadata: ReportMetadata,
    pub classes: Vec<ClassAssignments>,
}

impl ClassReport {
    /// Case-insensitive lookup by class name.
    pub fn class(&self, name: &str) -> Option<&ClassAssignments> {
        let wanted = name.trim().to_lowercase();
        self.classes
            .iter()
            .find(|c| c.class_name.to_lowercase() == wanted)
    }
}

/// What a commit wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitSummary {
    pub date: DateKey,
    pub overall_average: u32,
    pub streak: u32,
    pub a_grade_classes: usize,
    pub classes: usize,
    pub assignments: usize,
    pub missing: usize,
    pub cache_entries: usize,
}

// ═══════════════════════════════════════════
// Load / save
// ═══════════════════════════════════════════

pub fn load_grades(path: &Path) -> Result<Option<GradesSnapshot>, PipelineError> {
    read_json(path)
}

pub fn save_grades(path: &Path, snapshot: &GradesSnapshot) -> Result<(), PipelineError> {
    write_json_atomic(path, snapshot)
}

pub fn save_missing(
    path: &Path,
    missing: &[MissingAssignment],
    now: DateTime<Utc>,
) -> Result<(), PipelineError> {
    write_json_atomic(path, &missing_snapshot(missing, now))
}

pub fn save_class_report(
    path: &Path,
    grouped: &[ClassAssignments],
    now: DateTime<Utc>,
) -> Result<(), PipelineError> {
    write_json_atomic(path, &class_report(grouped, now))
}

pub fn load_class_report(path: &Path) -> Result<Option<ClassReport>, PipelineError> {
    read_json(path)
}

fn missing_snapshot(missing: &[MissingAssignment], now: DateTime<Utc>) -> MissingSnapshot {
    MissingSnapshot {
        metadata: MissingMetadata {
            last_updated: now,
            count: missing.len(),
        },
        missing_assignments: missing.to_vec(),
    }
}

fn class_report(grouped: &[ClassAssignments], now: DateTime<Utc>) -> ClassReport {
    ClassReport {
        metadata: ReportMetadata {
            scraped_at: now,
            total_classes: grouped.len(),
            total_assignments: grouped.iter().map(|c| c.assignments.len()).sum(),
        },
        classes: grouped.to_vec(),
    }
}

/// Merge a completed run into the snapshots and write them all.
///
/// Every structure is built before the first write, so a corrupt grades
/// snapshot aborts the commit without touching anything on disk.
pub fn commit_run(
    mut run: ExtractionRun,
    paths: &SnapshotPaths,
    date: DateKey,
    now: DateTime<Utc>,
) -> Result<CommitSummary, PipelineError> {
    let existing = load_grades(&paths.grades)?.unwrap_or_default();
    let merged = merge_day(existing.history, &run.classes, &run.missing, date);

    let grades = GradesSnapshot {
        metadata: GradesMetadata {
            last_updated: Some(now),
            most_recent_date: Some(date),
            total_classes: merged.classes.len(),
            run_id: Some(run.run_id.clone()),
            version: Some(APP_VERSION.to_string()),
        },
        a_grade_classes: a_grade_count(&merged.classes),
        classes: merged.classes,
        overall_average: merged.overall_average,
        streak: merged.streak,
        history: merged.series,
    };
    let missing = missing_snapshot(&run.missing, now);
    let report = class_report(&run.grouped, now);

    save_grades(&paths.grades, &grades)?;
    write_json_atomic(&paths.missing, &missing)?;
    write_json_atomic(&paths.class_report, &report)?;
    run.cache.persist(&paths.cache, now)?;

    let summary = CommitSummary {
        date,
        overall_average: grades.overall_average,
        streak: grades.streak,
        a_grade_classes: grades.a_grade_classes,
        classes: grades.classes.len(),
        assignments: report.metadata.total_assignments,
        missing: missing.metadata.count,
        cache_entries: run.cache.len(),
    };
    tracing::info!(
        run_id = %run.run_id,
        average = summary.overall_average,
        streak = summary.streak,
        "Run committed"
    );
    Ok(summary)
}

// ═══════════════════════════════════════════
// JSON file helpers
// ═══════════════════════════════════════════

/// `Ok(None)` when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PipelineError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| PipelineError::CorruptSnapshot {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}
