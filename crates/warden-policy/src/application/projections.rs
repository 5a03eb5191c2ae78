//! Projection handlers that fold policy events into their views.
//!
//! Folds are idempotent per row: an event whose sequence the row already
//! reached is skipped, so replaying from an older watermark is harmless.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};
use warden_core::error::DomainError;
use warden_core::projection::ProjectionHandler;
use warden_core::store::{EventFilter, StoredEvent};

use crate::domain::aggregates::{IAM_AGGREGATE_TYPE, ORG_AGGREGATE_TYPE, PolicyState};
use crate::domain::events::{
    LOCKOUT_POLICY_EVENT_TYPES, LockoutSettings, MAIL_TEXT_EVENT_TYPES, ORG_IAM_POLICY_EVENT_TYPES,
    OrgIamSettings, PolicyEventKind, decode,
};
use crate::infrastructure::views::{MailTextView, MailTextViewStore, PolicyView, PolicyViewStore};

/// View name of the lockout policy projection.
pub const LOCKOUT_POLICY_VIEW: &str = "projections.lockout_policies";
/// View name of the org IAM policy projection.
pub const ORG_IAM_POLICY_VIEW: &str = "projections.org_iam_policies";
/// View name of the mail text projection.
pub const MAIL_TEXT_VIEW: &str = "projections.mail_texts";

const DEFAULT_CYCLE: Duration = Duration::from_secs(1);

fn new_row<S>(event: &StoredEvent, settings: S) -> PolicyView<S> {
    PolicyView {
        id: event.aggregate_id.clone(),
        sequence: event.sequence,
        creation_date: event.created_at,
        change_date: event.created_at,
        resource_owner: event.resource_owner.clone(),
        state: PolicyState::Active,
        is_default: event.aggregate_type == IAM_AGGREGATE_TYPE,
        settings,
    }
}

fn missing_row(view: &str, event: &StoredEvent) -> DomainError {
    DomainError::ConstraintViolation(format!(
        "{view} has no row for {} to apply sequence {}",
        event.aggregate_id, event.sequence
    ))
}

fn foreign_event(view: &str, event: &StoredEvent) -> DomainError {
    DomainError::ConstraintViolation(format!("{view} does not fold {}", event.event_type))
}

/// Maintains `projections.lockout_policies`.
pub struct LockoutPolicyProjection {
    views: Arc<dyn PolicyViewStore<LockoutSettings>>,
    cycle: Duration,
}

impl LockoutPolicyProjection {
    /// Creates the projection over `views`.
    #[must_use]
    pub fn new(views: Arc<dyn PolicyViewStore<LockoutSettings>>) -> Self {
        Self {
            views,
            cycle: DEFAULT_CYCLE,
        }
    }

    /// Overrides the minimum cycle duration.
    #[must_use]
    pub fn with_cycle(mut self, cycle: Duration) -> Self {
        self.cycle = cycle;
        self
    }
}

impl std::fmt::Debug for LockoutPolicyProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockoutPolicyProjection")
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ProjectionHandler for LockoutPolicyProjection {
    fn view_model(&self) -> &str {
        LOCKOUT_POLICY_VIEW
    }

    fn event_query(&self) -> EventFilter {
        EventFilter::new()
            .aggregate_types([IAM_AGGREGATE_TYPE, ORG_AGGREGATE_TYPE])
            .event_types(LOCKOUT_POLICY_EVENT_TYPES)
    }

    #[instrument(skip_all, fields(position = event.position, event_type = %event.event_type))]
    async fn process(&self, event: &StoredEvent) -> Result<(), DomainError> {
        match decode(event)? {
            PolicyEventKind::LockoutPolicyAdded(settings) => {
                self.views.upsert(new_row(event, settings)).await
            }
            PolicyEventKind::LockoutPolicyChanged(change) => {
                let mut row = self
                    .views
                    .get(&event.aggregate_id)
                    .await?
                    .ok_or_else(|| missing_row(LOCKOUT_POLICY_VIEW, event))?;
                if row.sequence >= event.sequence {
                    debug!(row_sequence = row.sequence, "already folded");
                    return Ok(());
                }
                change.apply_to(&mut row.settings);
                row.sequence = event.sequence;
                row.change_date = event.created_at;
                self.views.upsert(row).await
            }
            PolicyEventKind::LockoutPolicyRemoved(_) => {
                self.views.delete(&event.aggregate_id).await
            }
            _ => Err(foreign_event(LOCKOUT_POLICY_VIEW, event)),
        }
    }

    fn minimum_cycle_duration(&self) -> Duration {
        self.cycle
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.views.clear().await
    }
}

/// Maintains `projections.org_iam_policies`.
pub struct OrgIamPolicyProjection {
    views: Arc<dyn PolicyViewStore<OrgIamSettings>>,
    cycle: Duration,
}

impl OrgIamPolicyProjection {
    /// Creates the projection over `views`.
    #[must_use]
    pub fn new(views: Arc<dyn PolicyViewStore<OrgIamSettings>>) -> Self {
        Self {
            views,
            cycle: DEFAULT_CYCLE,
        }
    }

    /// Overrides the minimum cycle duration.
    #[must_use]
    pub fn with_cycle(mut self, cycle: Duration) -> Self {
        self.cycle = cycle;
        self
    }
}

impl std::fmt::Debug for OrgIamPolicyProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrgIamPolicyProjection")
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ProjectionHandler for OrgIamPolicyProjection {
    fn view_model(&self) -> &str {
        ORG_IAM_POLICY_VIEW
    }

    fn event_query(&self) -> EventFilter {
        EventFilter::new()
            .aggregate_types([IAM_AGGREGATE_TYPE, ORG_AGGREGATE_TYPE])
            .event_types(ORG_IAM_POLICY_EVENT_TYPES)
    }

    #[instrument(skip_all, fields(position = event.position, event_type = %event.event_type))]
    async fn process(&self, event: &StoredEvent) -> Result<(), DomainError> {
        match decode(event)? {
            PolicyEventKind::OrgIamPolicyAdded(settings) => {
                self.views.upsert(new_row(event, settings)).await
            }
            PolicyEventKind::OrgIamPolicyChanged(change) => {
                let mut row = self
                    .views
                    .get(&event.aggregate_id)
                    .await?
                    .ok_or_else(|| missing_row(ORG_IAM_POLICY_VIEW, event))?;
                if row.sequence >= event.sequence {
                    debug!(row_sequence = row.sequence, "already folded");
                    return Ok(());
                }
                change.apply_to(&mut row.settings);
                row.sequence = event.sequence;
                row.change_date = event.created_at;
                self.views.upsert(row).await
            }
            PolicyEventKind::OrgIamPolicyRemoved(_) => {
                self.views.delete(&event.aggregate_id).await
            }
            _ => Err(foreign_event(ORG_IAM_POLICY_VIEW, event)),
        }
    }

    fn minimum_cycle_duration(&self) -> Duration {
        self.cycle
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.views.clear().await
    }
}

/// Maintains `projections.mail_texts`, one row per instance, template and
/// language.
pub struct MailTextProjection {
    views: Arc<dyn MailTextViewStore>,
    cycle: Duration,
}

impl MailTextProjection {
    /// Creates the projection over `views`.
    #[must_use]
    pub fn new(views: Arc<dyn MailTextViewStore>) -> Self {
        Self {
            views,
            cycle: DEFAULT_CYCLE,
        }
    }

    /// Overrides the minimum cycle duration.
    #[must_use]
    pub fn with_cycle(mut self, cycle: Duration) -> Self {
        self.cycle = cycle;
        self
    }
}

impl std::fmt::Debug for MailTextProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailTextProjection")
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ProjectionHandler for MailTextProjection {
    fn view_model(&self) -> &str {
        MAIL_TEXT_VIEW
    }

    fn event_query(&self) -> EventFilter {
        EventFilter::new()
            .aggregate_types([IAM_AGGREGATE_TYPE])
            .event_types(MAIL_TEXT_EVENT_TYPES)
    }

    #[instrument(skip_all, fields(position = event.position, event_type = %event.event_type))]
    async fn process(&self, event: &StoredEvent) -> Result<(), DomainError> {
        match decode(event)? {
            PolicyEventKind::MailTextAdded(added) => {
                self.views
                    .upsert(MailTextView {
                        aggregate_id: event.aggregate_id.clone(),
                        key: added.key,
                        sequence: event.sequence,
                        creation_date: event.created_at,
                        change_date: event.created_at,
                        resource_owner: event.resource_owner.clone(),
                        state: PolicyState::Active,
                        is_default: event.aggregate_type == IAM_AGGREGATE_TYPE,
                        content: added.content,
                    })
                    .await
            }
            PolicyEventKind::MailTextChanged(change) => {
                let mut row = self
                    .views
                    .get(&event.aggregate_id, &change.key)
                    .await?
                    .ok_or_else(|| missing_row(MAIL_TEXT_VIEW, event))?;
                if row.sequence >= event.sequence {
                    debug!(row_sequence = row.sequence, "already folded");
                    return Ok(());
                }
                change.apply_to(&mut row.content);
                row.sequence = event.sequence;
                row.change_date = event.created_at;
                self.views.upsert(row).await
            }
            _ => Err(foreign_event(MAIL_TEXT_VIEW, event)),
        }
    }

    fn minimum_cycle_duration(&self) -> Duration {
        self.cycle
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.views.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_test_support::stored_event;

    use crate::domain::events::{
        LOCKOUT_POLICY_ADDED_EVENT_TYPE, LOCKOUT_POLICY_CHANGED_EVENT_TYPE,
        LOCKOUT_POLICY_REMOVED_EVENT_TYPE, MAIL_TEXT_ADDED_EVENT_TYPE,
        MAIL_TEXT_CHANGED_EVENT_TYPE, MailTextKey, ORG_IAM_POLICY_ADDED_EVENT_TYPE,
    };
    use crate::infrastructure::memory_views::{InMemoryMailTextViews, InMemoryPolicyViews};

    fn lockout() -> (Arc<InMemoryPolicyViews<LockoutSettings>>, LockoutPolicyProjection) {
        let views = Arc::new(InMemoryPolicyViews::new());
        let projection = LockoutPolicyProjection::new(views.clone());
        (views, projection)
    }

    fn added(position: i64) -> StoredEvent {
        stored_event(
            position,
            "org-A",
            1,
            LOCKOUT_POLICY_ADDED_EVENT_TYPE,
            json!({"max_password_attempts": 5, "show_failures": false}),
        )
    }

    fn changed(position: i64) -> StoredEvent {
        stored_event(
            position,
            "org-A",
            2,
            LOCKOUT_POLICY_CHANGED_EVENT_TYPE,
            json!({"show_failures": true}),
        )
    }

    #[tokio::test]
    async fn test_added_then_changed_materializes_latest_row() {
        // Arrange
        let (views, projection) = lockout();

        // Act
        projection.process(&added(1)).await.unwrap();
        projection.process(&changed(2)).await.unwrap();

        // Assert
        let row = views.get("org-A").await.unwrap().unwrap();
        assert_eq!(row.sequence, 2);
        assert_eq!(row.state, PolicyState::Active);
        assert!(!row.is_default);
        assert_eq!(row.resource_owner, "org-A");
        assert_eq!(
            row.settings,
            LockoutSettings {
                max_password_attempts: 5,
                show_failures: true
            }
        );
        assert!(row.change_date > row.creation_date);
    }

    #[tokio::test]
    async fn test_refolding_an_applied_event_is_a_no_op() {
        // Arrange
        let (views, projection) = lockout();
        projection.process(&added(1)).await.unwrap();
        projection.process(&changed(2)).await.unwrap();
        let before = views.get("org-A").await.unwrap();

        // Act
        projection.process(&added(1)).await.unwrap();
        projection.process(&changed(2)).await.unwrap();

        // Assert
        assert_eq!(views.get("org-A").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_removed_deletes_row() {
        let (views, projection) = lockout();
        projection.process(&added(1)).await.unwrap();

        projection
            .process(&stored_event(
                2,
                "org-A",
                2,
                LOCKOUT_POLICY_REMOVED_EVENT_TYPE,
                json!({}),
            ))
            .await
            .unwrap();

        assert!(views.get("org-A").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_iam_events_produce_default_row() {
        let (views, projection) = lockout();
        let mut event = added(1);
        event.aggregate_type = IAM_AGGREGATE_TYPE.to_owned();
        event.aggregate_id = "iam".to_owned();

        projection.process(&event).await.unwrap();

        let row = views.get_default("iam").await.unwrap().unwrap();
        assert_eq!(row.id, "iam");
        assert!(row.is_default);
    }

    #[tokio::test]
    async fn test_change_without_row_fails_the_fold() {
        let (_views, projection) = lockout();

        let result = projection.process(&changed(2)).await;

        assert!(matches!(result, Err(DomainError::ConstraintViolation(_))));
    }

    #[tokio::test]
    async fn test_foreign_event_type_fails_the_fold() {
        let (_views, projection) = lockout();
        let event = stored_event(
            1,
            "org-A",
            1,
            ORG_IAM_POLICY_ADDED_EVENT_TYPE,
            json!({"user_login_must_be_domain": true}),
        );

        assert!(projection.process(&event).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_empties_the_view() {
        let (views, projection) = lockout();
        projection.process(&added(1)).await.unwrap();

        projection.clear().await.unwrap();

        assert!(views.get("org-A").await.unwrap().is_none());
    }

    #[test]
    fn test_event_query_selects_only_lockout_events() {
        let (_views, projection) = lockout();
        let filter = projection.event_query();

        assert_eq!(filter.event_types, LOCKOUT_POLICY_EVENT_TYPES.to_vec());
        assert!(filter.matches(&changed(2)));
        assert!(!filter.matches(&stored_event(
            3,
            "org-A",
            3,
            ORG_IAM_POLICY_ADDED_EVENT_TYPE,
            json!({})
        )));
    }

    #[tokio::test]
    async fn test_org_iam_projection_folds_added() {
        let views = Arc::new(InMemoryPolicyViews::<OrgIamSettings>::new());
        let projection = OrgIamPolicyProjection::new(views.clone());

        projection
            .process(&stored_event(
                1,
                "org-A",
                1,
                ORG_IAM_POLICY_ADDED_EVENT_TYPE,
                json!({"user_login_must_be_domain": true}),
            ))
            .await
            .unwrap();

        let row = views.get("org-A").await.unwrap().unwrap();
        assert!(row.settings.user_login_must_be_domain);
    }

    fn iam_event(sequence: i64, event_type: &str, payload: serde_json::Value) -> StoredEvent {
        let mut event = stored_event(sequence, "iam", sequence, event_type, payload);
        event.aggregate_type = IAM_AGGREGATE_TYPE.to_owned();
        event
    }

    fn mail_text_added(sequence: i64, language: &str, subject: &str) -> StoredEvent {
        iam_event(
            sequence,
            MAIL_TEXT_ADDED_EVENT_TYPE,
            json!({
                "mail_text_type": "InitCode",
                "language": language,
                "title": "Welcome",
                "pre_header": "Your account",
                "subject": subject,
                "greeting": "Hello",
                "text": "Use the code to finish setup.",
                "button_text": "Finish"
            }),
        )
    }

    #[tokio::test]
    async fn test_mail_texts_materialize_one_row_per_language() {
        // Arrange
        let views = Arc::new(InMemoryMailTextViews::new());
        let projection = MailTextProjection::new(views.clone());
        let change = iam_event(
            3,
            MAIL_TEXT_CHANGED_EVENT_TYPE,
            json!({"mail_text_type": "InitCode", "language": "de", "subject": "Konto bereit"}),
        );

        // Act
        projection.process(&mail_text_added(1, "en", "Account ready")).await.unwrap();
        projection.process(&mail_text_added(2, "de", "Konto")).await.unwrap();
        projection.process(&change).await.unwrap();
        projection.process(&change).await.unwrap();

        // Assert
        let german = views
            .get("iam", &MailTextKey::new("InitCode", "de"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(german.content.subject, "Konto bereit");
        assert_eq!(german.content.button_text, "Finish");
        assert_eq!(german.sequence, 3);
        assert!(german.is_default);
        let english = views
            .get("iam", &MailTextKey::new("InitCode", "en"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(english.content.subject, "Account ready");
        assert_eq!(english.sequence, 1);
    }

    #[tokio::test]
    async fn test_mail_text_change_without_row_fails_the_fold() {
        let projection = MailTextProjection::new(Arc::new(InMemoryMailTextViews::new()));
        let change = iam_event(
            1,
            MAIL_TEXT_CHANGED_EVENT_TYPE,
            json!({"mail_text_type": "InitCode", "language": "fr", "subject": "Bonjour"}),
        );

        let result = projection.process(&change).await;

        assert!(matches!(result, Err(DomainError::ConstraintViolation(_))));
    }
}
