//! Query handlers for the policy context.
//!
//! Reads go straight to the projected views and never take a lease. An org
//! without its own row sees the default of instance `iam_id`.

use tracing::instrument;
use warden_core::error::DomainError;

use crate::domain::events::{LockoutSettings, MailTextKey, OrgIamSettings};
use crate::infrastructure::views::{MailTextView, MailTextViewStore, PolicyView, PolicyViewStore};

async fn scoped_or_default<S>(
    what: &str,
    iam_id: &str,
    org_id: &str,
    views: &dyn PolicyViewStore<S>,
) -> Result<PolicyView<S>, DomainError>
where
    S: Send + Sync + 'static,
{
    if let Some(row) = views.get(org_id).await? {
        return Ok(row);
    }
    views
        .get_default(iam_id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("{what} for {org_id}")))
}

/// Returns the lockout policy in effect for `org_id`, falling back to the
/// default of instance `iam_id`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if neither row exists.
#[instrument(skip(views))]
pub async fn my_lockout_policy(
    iam_id: &str,
    org_id: &str,
    views: &dyn PolicyViewStore<LockoutSettings>,
) -> Result<PolicyView<LockoutSettings>, DomainError> {
    scoped_or_default("lockout policy", iam_id, org_id, views).await
}

/// Returns the default lockout policy of instance `iam_id`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no default was projected yet.
pub async fn default_lockout_policy(
    iam_id: &str,
    views: &dyn PolicyViewStore<LockoutSettings>,
) -> Result<PolicyView<LockoutSettings>, DomainError> {
    views
        .get_default(iam_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("default lockout policy".into()))
}

/// Returns the org IAM policy in effect for `org_id`, falling back to the
/// default of instance `iam_id`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if neither row exists.
#[instrument(skip(views))]
pub async fn my_org_iam_policy(
    iam_id: &str,
    org_id: &str,
    views: &dyn PolicyViewStore<OrgIamSettings>,
) -> Result<PolicyView<OrgIamSettings>, DomainError> {
    scoped_or_default("org iam policy", iam_id, org_id, views).await
}

/// Returns the default org IAM policy of instance `iam_id`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no default was projected yet.
pub async fn default_org_iam_policy(
    iam_id: &str,
    views: &dyn PolicyViewStore<OrgIamSettings>,
) -> Result<PolicyView<OrgIamSettings>, DomainError> {
    views
        .get_default(iam_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("default org iam policy".into()))
}

/// Returns mail text `key` of instance `iam_id`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if that template was never set in that
/// language.
#[instrument(skip(key, views), fields(key = %key))]
pub async fn mail_text(
    iam_id: &str,
    key: &MailTextKey,
    views: &dyn MailTextViewStore,
) -> Result<MailTextView, DomainError> {
    views
        .get(iam_id, key)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("mail text {key} of {iam_id}")))
}

/// Returns every mail text of instance `iam_id`.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` on storage failure.
pub async fn mail_texts(
    iam_id: &str,
    views: &dyn MailTextViewStore,
) -> Result<Vec<MailTextView>, DomainError> {
    views.list(iam_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use warden_core::projection::ProjectionHandler;
    use warden_test_support::stored_event;

    use crate::application::projections::{LockoutPolicyProjection, MailTextProjection};
    use crate::domain::events::{
        LOCKOUT_POLICY_ADDED_EVENT_TYPE, LOCKOUT_POLICY_REMOVED_EVENT_TYPE,
        MAIL_TEXT_ADDED_EVENT_TYPE,
    };
    use crate::infrastructure::memory_views::{InMemoryMailTextViews, InMemoryPolicyViews};

    fn iam_default(position: i64, sequence: i64, event_type: &str) -> warden_core::store::StoredEvent {
        let mut event = stored_event(
            position,
            "iam",
            sequence,
            event_type,
            json!({"max_password_attempts": 0, "show_failures": true}),
        );
        event.aggregate_type = "iam".to_owned();
        event
    }

    #[tokio::test]
    async fn test_org_without_row_falls_back_to_default() {
        // Arrange
        let views = Arc::new(InMemoryPolicyViews::<LockoutSettings>::new());
        let projection = LockoutPolicyProjection::new(views.clone());
        projection
            .process(&iam_default(1, 1, LOCKOUT_POLICY_ADDED_EVENT_TYPE))
            .await
            .unwrap();

        // Act
        let policy = my_lockout_policy("iam", "org-A", views.as_ref()).await.unwrap();

        // Assert
        assert_eq!(policy.id, "iam");
        assert!(policy.is_default);
        assert!(policy.settings.show_failures);
    }

    #[tokio::test]
    async fn test_org_row_wins_over_default() {
        let views = Arc::new(InMemoryPolicyViews::<LockoutSettings>::new());
        let projection = LockoutPolicyProjection::new(views.clone());
        projection
            .process(&iam_default(1, 1, LOCKOUT_POLICY_ADDED_EVENT_TYPE))
            .await
            .unwrap();
        projection
            .process(&stored_event(
                2,
                "org-A",
                1,
                LOCKOUT_POLICY_ADDED_EVENT_TYPE,
                json!({"max_password_attempts": 3, "show_failures": false}),
            ))
            .await
            .unwrap();

        let policy = my_lockout_policy("iam", "org-A", views.as_ref()).await.unwrap();

        assert_eq!(policy.id, "org-A");
        assert_eq!(policy.settings.max_password_attempts, 3);
        assert!(!policy.is_default);
    }

    #[tokio::test]
    async fn test_removing_the_default_row_yields_not_found() {
        // Arrange
        let views = Arc::new(InMemoryPolicyViews::<LockoutSettings>::new());
        let projection = LockoutPolicyProjection::new(views.clone());
        projection
            .process(&iam_default(1, 1, LOCKOUT_POLICY_ADDED_EVENT_TYPE))
            .await
            .unwrap();
        let mut removed = iam_default(2, 2, LOCKOUT_POLICY_REMOVED_EVENT_TYPE);
        removed.payload = json!({});
        projection.process(&removed).await.unwrap();

        // Act
        let result = my_lockout_policy("iam", "org-A", views.as_ref()).await;

        // Assert
        match result {
            Err(DomainError::NotFound(what)) => assert_eq!(what, "lockout policy for org-A"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_default_queries_report_not_found_on_empty_views() {
        let lockout: InMemoryPolicyViews<LockoutSettings> = InMemoryPolicyViews::new();
        let org_iam: InMemoryPolicyViews<OrgIamSettings> = InMemoryPolicyViews::new();

        assert!(default_lockout_policy("iam", &lockout).await.unwrap_err().is_not_found());
        assert!(default_org_iam_policy("iam", &org_iam).await.unwrap_err().is_not_found());
        assert!(my_org_iam_policy("iam", "org-A", &org_iam).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_default_of_another_instance_is_ignored() {
        // Arrange
        let views = Arc::new(InMemoryPolicyViews::<LockoutSettings>::new());
        let projection = LockoutPolicyProjection::new(views.clone());
        let mut foreign = iam_default(1, 1, LOCKOUT_POLICY_ADDED_EVENT_TYPE);
        foreign.aggregate_id = "other-iam".to_owned();
        foreign.resource_owner = "other-iam".to_owned();
        projection.process(&foreign).await.unwrap();

        // Act
        let scoped = my_lockout_policy("iam", "org-A", views.as_ref()).await;
        let default = default_lockout_policy("iam", views.as_ref()).await;

        // Assert
        assert!(scoped.unwrap_err().is_not_found());
        assert!(default.unwrap_err().is_not_found());
        let other = default_lockout_policy("other-iam", views.as_ref()).await.unwrap();
        assert_eq!(other.id, "other-iam");
    }

    #[tokio::test]
    async fn test_mail_text_lookup_uses_type_and_language() {
        // Arrange
        let views = Arc::new(InMemoryMailTextViews::new());
        let projection = MailTextProjection::new(views.clone());
        let mut added = stored_event(
            1,
            "iam",
            1,
            MAIL_TEXT_ADDED_EVENT_TYPE,
            json!({
                "mail_text_type": "VerifyEmail",
                "language": "en",
                "title": "Verify",
                "pre_header": "Verify your email",
                "subject": "Verify your email",
                "greeting": "Hello",
                "text": "Click below.",
                "button_text": "Verify"
            }),
        );
        added.aggregate_type = "iam".to_owned();
        projection.process(&added).await.unwrap();

        // Act
        let found = mail_text("iam", &MailTextKey::new("VerifyEmail", "en"), views.as_ref()).await;
        let other_language =
            mail_text("iam", &MailTextKey::new("VerifyEmail", "it"), views.as_ref()).await;
        let listed = mail_texts("iam", views.as_ref()).await.unwrap();

        // Assert
        assert_eq!(found.unwrap().content.button_text, "Verify");
        match other_language {
            Err(DomainError::NotFound(what)) => assert_eq!(what, "mail text VerifyEmail/it of iam"),
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert_eq!(listed.len(), 1);
    }
}
