//! Document providers.
//!
//! Live browser automation sits outside this crate; the recorded provider
//! replays a captured gradebook for offline runs and tests.

pub mod recorded;

pub use recorded::{CapturedAssignment, CapturedGradebook, RecordedProvider};
