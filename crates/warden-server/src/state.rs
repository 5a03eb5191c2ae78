//! Shared application state.

use std::sync::Arc;

use warden_core::watermark::WatermarkStore;
use warden_iam::infrastructure::views::IamMemberViewStore;
use warden_policy::domain::events::{LockoutSettings, OrgIamSettings};
use warden_policy::infrastructure::views::{MailTextViewStore, PolicyViewStore};
use warden_spooler::{StatusBoard, ViewResets};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Id of the instance whose policies are the defaults.
    pub iam_id: String,
    /// Last cycle outcome per view.
    pub status: StatusBoard,
    /// Re-projection requests for the running spooler's views.
    pub resets: ViewResets,
    /// Persisted watermarks.
    pub watermarks: Arc<dyn WatermarkStore>,
    /// `projections.lockout_policies`.
    pub lockout_policies: Arc<dyn PolicyViewStore<LockoutSettings>>,
    /// `projections.org_iam_policies`.
    pub org_iam_policies: Arc<dyn PolicyViewStore<OrgIamSettings>>,
    /// `projections.mail_texts`.
    pub mail_texts: Arc<dyn MailTextViewStore>,
    /// `projections.iam_members`.
    pub iam_members: Arc<dyn IamMemberViewStore>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("iam_id", &self.iam_id)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
