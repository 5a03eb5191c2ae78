//! Projection of `iam.member.*` events into `projections.iam_members`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};
use warden_core::error::DomainError;
use warden_core::projection::ProjectionHandler;
use warden_core::store::{EventFilter, StoredEvent};

use crate::domain::aggregates::IAM_AGGREGATE_TYPE;
use crate::domain::events::{MEMBER_EVENT_TYPES, MemberEventKind, decode};
use crate::infrastructure::views::{IamMemberView, IamMemberViewStore};

/// View name of the member projection.
pub const IAM_MEMBER_VIEW: &str = "projections.iam_members";

/// Maintains `projections.iam_members`.
pub struct IamMemberProjection {
    views: Arc<dyn IamMemberViewStore>,
    cycle: Duration,
}

impl IamMemberProjection {
    /// Creates the projection over `views`.
    #[must_use]
    pub fn new(views: Arc<dyn IamMemberViewStore>) -> Self {
        Self {
            views,
            cycle: Duration::from_secs(1),
        }
    }

    /// Overrides the minimum cycle duration.
    #[must_use]
    pub fn with_cycle(mut self, cycle: Duration) -> Self {
        self.cycle = cycle;
        self
    }
}

impl std::fmt::Debug for IamMemberProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IamMemberProjection")
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ProjectionHandler for IamMemberProjection {
    fn view_model(&self) -> &str {
        IAM_MEMBER_VIEW
    }

    fn event_query(&self) -> EventFilter {
        EventFilter::new()
            .aggregate_types([IAM_AGGREGATE_TYPE])
            .event_types(MEMBER_EVENT_TYPES)
    }

    #[instrument(skip_all, fields(position = event.position, event_type = %event.event_type))]
    async fn process(&self, event: &StoredEvent) -> Result<(), DomainError> {
        let iam_id = event.aggregate_id.as_str();
        match decode(event)? {
            MemberEventKind::Added(grant) => {
                self.views
                    .upsert(IamMemberView {
                        iam_id: iam_id.to_owned(),
                        user_id: grant.user_id,
                        roles: grant.roles,
                        sequence: event.sequence,
                        creation_date: event.created_at,
                        change_date: event.created_at,
                        resource_owner: event.resource_owner.clone(),
                    })
                    .await
            }
            MemberEventKind::Changed(grant) => {
                let mut row = self
                    .views
                    .get(iam_id, &grant.user_id)
                    .await?
                    .ok_or_else(|| {
                        DomainError::ConstraintViolation(format!(
                            "{IAM_MEMBER_VIEW} has no row for {} on {iam_id} to apply sequence {}",
                            grant.user_id, event.sequence
                        ))
                    })?;
                if row.sequence >= event.sequence {
                    debug!(row_sequence = row.sequence, "already folded");
                    return Ok(());
                }
                row.roles = grant.roles;
                row.sequence = event.sequence;
                row.change_date = event.created_at;
                self.views.upsert(row).await
            }
            MemberEventKind::Removed(removed) => self.views.delete(iam_id, &removed.user_id).await,
        }
    }

    fn minimum_cycle_duration(&self) -> Duration {
        self.cycle
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.views.clear().await
    }
}
