//! Trait definitions for the gradebook pipeline.
//!
//! The orchestrator never touches the document tree directly. Everything it
//! needs from the live gradebook goes through [`DocumentProvider`], which keeps
//! browser automation (or a recorded capture) out of the core.

use super::error::ProviderError;
use super::types::*;
use crate::config::ProviderCredentials;

/// Narrow capability over the interactive gradebook session.
///
/// Methods are called sequentially by a single run. At most one detail view
/// is open at a time: `open_detail` is only called after the previous view
/// was dismissed (or assumed dismissed after a timeout).
#[allow(async_fn_in_trait)]
pub trait DocumentProvider {
    /// Log in and navigate to the gradebook.
    async fn open_session(
        &mut self,
        credentials: &ProviderCredentials,
    ) -> Result<(), ProviderError>;

    /// Snapshot of the class-listing region.
    async fn class_listing(&mut self) -> Result<Vec<ClassListingEntry>, ProviderError>;

    /// Visible assignment links, positionally stable for the run.
    async fn assignment_refs(&mut self) -> Result<Vec<AssignmentRef>, ProviderError>;

    /// Group identifier of the nearest class-listing fragment preceding the
    /// reference in document order.
    fn preceding_class_group(&self, reference: &AssignmentRef) -> Option<String>;

    /// Open the detail view for one reference and return its visible content.
    async fn open_detail(
        &mut self,
        reference: &AssignmentRef,
    ) -> Result<DetailFragment, ProviderError>;

    /// Attempt one dismissal action. `Ok(true)` when the view is now closed.
    async fn close_detail(&mut self, action: DismissAction) -> Result<bool, ProviderError>;

    /// Rows of the missing-assignments table, one `Vec` of cell text per row.
    async fn missing_assignment_rows(&mut self) -> Result<Vec<Vec<String>>, ProviderError>;
}
