use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::PipelineError;

/// Application-level constants
pub const APP_NAME: &str = "Gradewatch";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_DETAIL_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Get the application data directory
/// ~/Gradewatch/ on all platforms, or the working directory when no home is set.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default tracing filter, overridden by `RUST_LOG`.
pub fn default_log_filter() -> &'static str {
    "gradewatch=info,gradewatch_lib=info"
}

/// Locations of every snapshot a run reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub cache: PathBuf,
    pub grades: PathBuf,
    pub missing: PathBuf,
    pub class_report: PathBuf,
}

impl SnapshotPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            cache: dir.join("assignment_cache.json"),
            grades: dir.join("grades.json"),
            missing: dir.join("missing_assignments.json"),
            class_report: dir.join("class_assignments.json"),
        }
    }
}

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Upper bound on references visited; `None` processes all of them.
    pub max_assignments: Option<usize>,
    /// Bounded wait for a detail view to open.
    pub detail_timeout: Duration,
    /// Bounded wait for each dismissal attempt.
    pub close_timeout: Duration,
    /// Only consider classes flagged as part of the active period.
    pub current_classes_only: bool,
    /// Marking period filter for missing assignments, e.g. `Q3`.
    pub marking_period: Option<String>,
    /// Re-extract even when a graded cache entry exists.
    pub force_refresh: bool,
    pub data_dir: PathBuf,
    /// Handed to the provider when the session opens.
    pub credentials: ProviderCredentials,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_assignments: None,
            detail_timeout: DEFAULT_DETAIL_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            current_classes_only: true,
            marking_period: None,
            force_refresh: false,
            data_dir: app_data_dir(),
            credentials: ProviderCredentials::default(),
        }
    }
}

impl RunConfig {
    /// Defaults overlaid with `GRADEWATCH_*` environment variables.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(raw) = read("GRADEWATCH_MAX_ASSIGNMENTS") {
            config.max_assignments = Some(parse_number(&raw, "GRADEWATCH_MAX_ASSIGNMENTS")?);
        }
        if let Some(raw) = read("GRADEWATCH_DETAIL_TIMEOUT_MS") {
            config.detail_timeout =
                Duration::from_millis(parse_number(&raw, "GRADEWATCH_DETAIL_TIMEOUT_MS")?);
        }
        if let Some(raw) = read("GRADEWATCH_CLOSE_TIMEOUT_MS") {
            config.close_timeout =
                Duration::from_millis(parse_number(&raw, "GRADEWATCH_CLOSE_TIMEOUT_MS")?);
        }
        if let Some(raw) = read("GRADEWATCH_PERIOD") {
            config.marking_period = Some(normalize_period(&raw)?);
        }
        if let Some(raw) = read("GRADEWATCH_DATA_DIR") {
            config.data_dir = PathBuf::from(raw);
        }
        if let Some(username) = read("GRADEWATCH_USERNAME") {
            config.credentials.username = username;
        }
        if let Some(password) = lookup("GRADEWATCH_PASSWORD") {
            config.credentials.password = password;
        }
        Ok(config)
    }

    pub fn snapshot_paths(&self) -> SnapshotPaths {
        SnapshotPaths::in_dir(&self.data_dir)
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T, PipelineError> {
    raw.parse().map_err(|_| {
        PipelineError::Config(format!("{key} must be a non-negative integer, got '{raw}'"))
    })
}

/// Accepts `3`, `q3` or `Q3` and returns `Q3`.
pub fn normalize_period(raw: &str) -> Result<String, PipelineError> {
    let digits = raw.trim().trim_start_matches(['Q', 'q']);
    match digits.parse::<u8>() {
        Ok(n) if (1..=4).contains(&n) => Ok(format!("Q{n}")),
        _ => Err(PipelineError::Config(format!(
            "marking period must be Q1-Q4, got '{raw}'"
        ))),
    }
}

/// Opaque provider login parameters, read from `GRADEWATCH_USERNAME` and
/// `GRADEWATCH_PASSWORD`.
#[derive(Clone, Default)]
pub struct ProviderCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
