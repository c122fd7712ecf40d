//! Error types for the gradebook extraction pipeline.
//!
//! Only run-level failures surface here. Per-assignment problems (no score
//! found, a detail view that never opened, an unknown class) are absorbed
//! into ungraded or fallback records by the runner and never become errors.

use std::path::PathBuf;

use thiserror::Error;

/// Which part of a run was executing when the provider failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Login,
    Navigation,
    ClassListing,
    Enumeration,
    Extraction,
    MissingAssignments,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Navigation => "navigation",
            Self::ClassListing => "class_listing",
            Self::Enumeration => "enumeration",
            Self::Extraction => "extraction",
            Self::MissingAssignments => "missing_assignments",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failures reported by a [`DocumentProvider`](super::traits::DocumentProvider).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Session lost: {0}")]
    SessionLost(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Detail view unavailable: {0}")]
    DetailUnavailable(String),

    #[error("Query failed: {0}")]
    Query(String),
}

impl ProviderError {
    /// Session and navigation loss end the run. Everything else is scoped
    /// to the assignment or query that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionLost(_) | Self::Navigation(_))
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Provider failed during {phase}: {source}")]
    Provider {
        phase: RunPhase,
        #[source]
        source: ProviderError,
    },

    #[error("Snapshot at {path} is corrupt: {source}")]
    CorruptSnapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot write failed: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Why a hypothetical assignment was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputProblem {
    NegativeScore,
    NonPositiveMax,
    ExceedsLimit,
    NotFinite,
}

impl InputProblem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NegativeScore => "score earned cannot be negative",
            Self::NonPositiveMax => "max points must be greater than zero",
            Self::ExceedsLimit => "values cannot exceed 10,000 points",
            Self::NotFinite => "values must be valid numbers",
        }
    }
}

fn describe(problems: &[InputProblem]) -> String {
    problems
        .iter()
        .map(InputProblem::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug, PartialEq)]
pub enum ProjectionError {
    #[error("Invalid input: {}", describe(.0))]
    InvalidInput(Vec<InputProblem>),
}

impl PipelineError {
    pub fn provider(phase: RunPhase, source: ProviderError) -> Self {
        Self::Provider { phase, source }
    }

    /// Phase in which the run aborted, when the failure came from the provider.
    pub fn phase(&self) -> Option<RunPhase> {
        match self {
            Self::Provider { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}
