//! Replays a captured gradebook as a [`DocumentProvider`].
//!
//! A capture is the JSON a browser session would have produced: the class
//! listing, the visible assignment links with their detail fragments, and
//! the missing-assignments table.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ProviderCredentials;
use crate::pipeline::snapshot::read_json;
use crate::pipeline::traits::DocumentProvider;
use crate::pipeline::types::{AssignmentRef, ClassListingEntry, DetailFragment, DismissAction};
use crate::pipeline::{PipelineError, ProviderError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapturedAssignment {
    #[serde(flatten)]
    pub reference: AssignmentRef,
    /// Detail view content; `None` when the view never opened during capture.
    #[serde(default)]
    pub detail: Option<DetailFragment>,
    #[serde(default)]
    pub preceding_group: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapturedGradebook {
    #[serde(default)]
    pub classes: Vec<ClassListingEntry>,
    #[serde(default)]
    pub assignments: Vec<CapturedAssignment>,
    #[serde(default)]
    pub missing_rows: Vec<Vec<String>>,
}

#[derive(Debug)]
pub struct RecordedProvider {
    capture: CapturedGradebook,
    session_open: bool,
    open_detail: Option<usize>,
}

impl RecordedProvider {
    pub fn new(mut capture: CapturedGradebook) -> Self {
        for (i, assignment) in capture.assignments.iter_mut().enumerate() {
            assignment.reference.index = i;
        }
        Self {
            capture,
            session_open: false,
            open_detail: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let capture = read_json::<CapturedGradebook>(path)?.ok_or_else(|| {
            PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("capture not found: {}", path.display()),
            ))
        })?;
        tracing::debug!(
            classes = capture.classes.len(),
            assignments = capture.assignments.len(),
            "Loaded gradebook capture"
        );
        Ok(Self::new(capture))
    }

    fn require_session(&self) -> Result<(), ProviderError> {
        if self.session_open {
            Ok(())
        } else {
            Err(ProviderError::SessionLost("session not opened".into()))
        }
    }

    pub fn is_detail_open(&self) -> bool {
        self.open_detail.is_some()
    }
}

impl DocumentProvider for RecordedProvider {
    async fn open_session(
        &mut self,
        _credentials: &ProviderCredentials,
    ) -> Result<(), ProviderError> {
        self.session_open = true;
        Ok(())
    }

    async fn class_listing(&mut self) -> Result<Vec<ClassListingEntry>, ProviderError> {
        self.require_session()?;
        Ok(self.capture.classes.clone())
    }

    async fn assignment_refs(&mut self) -> Result<Vec<AssignmentRef>, ProviderError> {
        self.require_session()?;
        Ok(self
            .capture
            .assignments
            .iter()
            .map(|a| a.reference.clone())
            .collect())
    }

    fn preceding_class_group(&self, reference: &AssignmentRef) -> Option<String> {
        self.capture
            .assignments
            .get(reference.index)
            .and_then(|a| a.preceding_group.clone())
    }

    async fn open_detail(
        &mut self,
        reference: &AssignmentRef,
    ) -> Result<DetailFragment, ProviderError> {
        self.require_session()?;
        if let Some(open) = self.open_detail {
            return Err(ProviderError::DetailUnavailable(format!(
                "detail view for assignment {open} is still open"
            )));
        }
        let detail = self
            .capture
            .assignments
            .get(reference.index)
            .and_then(|a| a.detail.clone())
            .ok_or_else(|| {
                ProviderError::DetailUnavailable(format!(
                    "no detail captured for '{}'",
                    reference.name
                ))
            })?;
        self.open_detail = Some(reference.index);
        Ok(detail)
    }

    async fn close_detail(&mut self, _action: DismissAction) -> Result<bool, ProviderError> {
        self.open_detail = None;
        Ok(true)
    }

    async fn missing_assignment_rows(&mut self) -> Result<Vec<Vec<String>>, ProviderError> {
        self.require_session()?;
        Ok(self.capture.missing_rows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunConfig, SnapshotPaths};
    use crate::pipeline::cache::ExtractionCache;
    use crate::pipeline::runner::run_extraction;
    use crate::pipeline::snapshot::{commit_run, load_grades};
    use crate::pipeline::types::DateKey;
    use chrono::Utc;

    const CAPTURE: &str = r#"{
        "classes": [
            {"group_id": "100", "class_name": "ALGEBRA", "teacher": "Rivera", "period": "1",
             "quarter_grades": ["90", "92%", null], "highlighted": true},
            {"group_id": "200", "class_name": "US HISTORY", "teacher": "Park", "period": "2",
             "quarter_grades": ["78", null, null], "highlighted": true}
        ],
        "assignments": [
            {"assignment_id": "1", "class_id": "100", "student_id": "9", "name": "Quiz 1",
             "due_label": "9/12/2025",
             "detail": {"text": "Quiz 1\nDue: 9/12/2025\nPoints Earned: 18/20"}},
            {"assignment_id": "2", "class_id": "x", "student_id": "9", "name": "Essay",
             "preceding_group": "200",
             "detail": {"text": "", "rows": [{"cells": ["Score", "*/50"]}]}},
            {"assignment_id": "3", "class_id": "200", "student_id": "9", "name": "Map work"}
        ],
        "missing_rows": [
            ["Due", "Assignment", "Class", "Teacher"],
            ["9/20/2025 (Q1)", "Worksheet", "US HISTORY", "Park", "Homework"]
        ]
    }"#;

    fn provider() -> RecordedProvider {
        RecordedProvider::new(serde_json::from_str(CAPTURE).unwrap())
    }

    #[tokio::test]
    async fn queries_require_session() {
        let mut p = provider();
        let err = p.class_listing().await.unwrap_err();
        assert!(err.is_fatal());
        p.open_session(&ProviderCredentials::default()).await.unwrap();
        assert_eq!(p.class_listing().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn second_open_is_rejected() {
        let mut p = provider();
        p.open_session(&ProviderCredentials::default()).await.unwrap();
        let refs = p.assignment_refs().await.unwrap();
        assert_eq!(refs[1].index, 1);

        p.open_detail(&refs[0]).await.unwrap();
        let err = p.open_detail(&refs[1]).await.unwrap_err();
        assert!(matches!(err, ProviderError::DetailUnavailable(_)));

        assert!(p.close_detail(DismissAction::CloseButton).await.unwrap());
        assert!(!p.is_detail_open());
        p.open_detail(&refs[1]).await.unwrap();
    }

    #[tokio::test]
    async fn preceding_group_comes_from_capture() {
        let p = provider();
        let reference = AssignmentRef {
            index: 1,
            ..Default::default()
        };
        assert_eq!(p.preceding_class_group(&reference).as_deref(), Some("200"));
    }

    #[tokio::test]
    async fn capture_runs_and_commits_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::in_dir(dir.path());
        let config = RunConfig {
            data_dir: dir.path().to_path_buf(),
            ..RunConfig::default()
        };

        let mut p = provider();
        let run = run_extraction(&mut p, ExtractionCache::new(), &config).await.unwrap();
        assert_eq!(run.stats.failures, 1, "map work has no captured detail");
        assert_eq!(run.missing.len(), 1);

        let names: Vec<_> = run.grouped.iter().map(|g| g.class_name.as_str()).collect();
        assert_eq!(names, vec!["Algebra", "Us History"]);
        assert_eq!(run.grouped[1].assignments.len(), 2);

        let today = DateKey::parse("9/22/2025").unwrap();
        let summary = commit_run(run, &paths, today, Utc::now()).unwrap();
        assert_eq!(summary.overall_average, 85);
        assert_eq!(summary.streak, 0);
        assert_eq!(summary.cache_entries, 1);

        let grades = load_grades(&paths.grades).unwrap().unwrap();
        assert_eq!(grades.history.grade_history["Algebra"][&today], 92.0);
        assert_eq!(grades.history.grade_history["Us History"][&today], 78.0);
    }

    #[test]
    fn missing_capture_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RecordedProvider::load(&dir.path().join("capture.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
