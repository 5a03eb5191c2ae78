//! Routes for the policy read models.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use warden_policy::application::query_handlers;
use warden_policy::domain::events::{LockoutSettings, MailTextKey, OrgIamSettings};
use warden_policy::infrastructure::views::{MailTextView, PolicyView};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/v1/policies/lockout/default
async fn default_lockout(
    State(state): State<AppState>,
) -> Result<Json<PolicyView<LockoutSettings>>, ApiError> {
    let policy =
        query_handlers::default_lockout_policy(&state.iam_id, state.lockout_policies.as_ref())
            .await?;
    Ok(Json(policy))
}

/// GET /api/v1/policies/lockout/orgs/{org_id}
async fn org_lockout(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> Result<Json<PolicyView<LockoutSettings>>, ApiError> {
    let policy =
        query_handlers::my_lockout_policy(&state.iam_id, &org_id, state.lockout_policies.as_ref())
            .await?;
    Ok(Json(policy))
}

/// GET /api/v1/policies/org-iam/default
async fn default_org_iam(
    State(state): State<AppState>,
) -> Result<Json<PolicyView<OrgIamSettings>>, ApiError> {
    let policy =
        query_handlers::default_org_iam_policy(&state.iam_id, state.org_iam_policies.as_ref())
            .await?;
    Ok(Json(policy))
}

/// GET /api/v1/policies/org-iam/orgs/{org_id}
async fn org_org_iam(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> Result<Json<PolicyView<OrgIamSettings>>, ApiError> {
    let policy =
        query_handlers::my_org_iam_policy(&state.iam_id, &org_id, state.org_iam_policies.as_ref())
            .await?;
    Ok(Json(policy))
}

/// GET /api/v1/policies/mail-texts
async fn list_mail_texts(
    State(state): State<AppState>,
) -> Result<Json<Vec<MailTextView>>, ApiError> {
    let texts = query_handlers::mail_texts(&state.iam_id, state.mail_texts.as_ref()).await?;
    Ok(Json(texts))
}

/// GET /api/v1/policies/mail-texts/{mail_text_type}/{language}
async fn get_mail_text(
    State(state): State<AppState>,
    Path((mail_text_type, language)): Path<(String, String)>,
) -> Result<Json<MailTextView>, ApiError> {
    let key = MailTextKey::new(mail_text_type, language);
    let text = query_handlers::mail_text(&state.iam_id, &key, state.mail_texts.as_ref()).await?;
    Ok(Json(text))
}

/// Returns the router for the policy context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/lockout/default", get(default_lockout))
        .route("/lockout/orgs/{org_id}", get(org_lockout))
        .route("/org-iam/default", get(default_org_iam))
        .route("/org-iam/orgs/{org_id}", get(org_org_iam))
        .route("/mail-texts", get(list_mail_texts))
        .route("/mail-texts/{mail_text_type}/{language}", get(get_mail_text))
}
