//! Query handlers for the member context.

use tracing::instrument;
use warden_core::error::DomainError;

use crate::infrastructure::views::{IamMemberView, IamMemberViewStore};

/// Returns the membership of `user_id` on `iam_id`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user is not a member.
#[instrument(skip(views))]
pub async fn iam_member(
    iam_id: &str,
    user_id: &str,
    views: &dyn IamMemberViewStore,
) -> Result<IamMemberView, DomainError> {
    views
        .get(iam_id, user_id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("member {user_id} of {iam_id}")))
}

/// Returns every member of `iam_id`, ordered by user id. An instance
/// without members yields an empty list.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` on storage failure.
#[instrument(skip(views))]
pub async fn iam_members(
    iam_id: &str,
    views: &dyn IamMemberViewStore,
) -> Result<Vec<IamMemberView>, DomainError> {
    views.list(iam_id).await
}
