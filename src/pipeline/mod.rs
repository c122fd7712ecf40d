//! Gradebook extraction pipeline
//!
//! Pulls assignment scores out of a gradebook that was never meant to be
//! machine-read, skips work already done in earlier runs, and folds each
//! day's grades into long-running history.
//!
//! ```text
//! DocumentProvider → Runner ─┬─ Cache (hit) ──────────────┬─ Correlator → grouped output
//!                            └─ Detail view → Fields (miss)┘
//!                                      ↓
//!                       Snapshot commit → Metrics merge
//! ```

pub mod error;
pub mod types;
pub mod traits;
pub mod fields;
pub mod correlation;
pub mod cache;
pub mod metrics;
pub mod missing;
pub mod projection;
pub mod runner;
pub mod snapshot;

pub use error::{InputProblem, PipelineError, ProjectionError, ProviderError, RunPhase};
pub use types::*;
pub use traits::DocumentProvider;
pub use cache::{CacheEntry, CacheUpdate, ExtractionCache};
pub use correlation::{correlate, ClassIndex, Correlation, CorrelationSource};
pub use metrics::{merge_day, normalize_class_name, DayMerge, GradedClass, HistorySeries};
pub use missing::parse_missing_rows;
pub use projection::{project_grade_impact, GradeImpact, Hypothetical};
pub use runner::{new_run_id, run_extraction, ExtractionRun};
pub use snapshot::{
    commit_run, load_class_report, load_grades, save_class_report, save_grades, save_missing,
    ClassReport, CommitSummary, GradesSnapshot,
};
