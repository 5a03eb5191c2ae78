//! Routes for the IAM member read model.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use warden_iam::application::query_handlers;
use warden_iam::infrastructure::views::IamMemberView;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/v1/iam/{iam_id}/members
async fn list_members(
    State(state): State<AppState>,
    Path(iam_id): Path<String>,
) -> Result<Json<Vec<IamMemberView>>, ApiError> {
    let members = query_handlers::iam_members(&iam_id, state.iam_members.as_ref()).await?;
    Ok(Json(members))
}

/// GET /api/v1/iam/{iam_id}/members/{user_id}
async fn get_member(
    State(state): State<AppState>,
    Path((iam_id, user_id)): Path<(String, String)>,
) -> Result<Json<IamMemberView>, ApiError> {
    let member =
        query_handlers::iam_member(&iam_id, &user_id, state.iam_members.as_ref()).await?;
    Ok(Json(member))
}

/// Returns the router for the member context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{iam_id}/members", get(list_members))
        .route("/{iam_id}/members/{user_id}", get(get_member))
}
