//! Projection status: watermark, lag and last outcome per view.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use warden_spooler::ViewStatus;

use crate::error::ApiError;
use crate::state::AppState;

/// One view as reported by `GET /views`.
#[derive(Debug, Serialize)]
pub struct ViewReport {
    /// What the local loop last did.
    #[serde(flatten)]
    pub status: ViewStatus,
    /// Watermark as persisted, which may have been moved by another instance.
    pub persisted_watermark: i64,
    /// When the persisted watermark last moved.
    pub persisted_at: Option<DateTime<Utc>>,
    /// A rebuild was requested and has not started yet.
    pub reset_pending: bool,
}

/// GET /views
async fn list_views(State(state): State<AppState>) -> Result<Json<Vec<ViewReport>>, ApiError> {
    let persisted = state.watermarks.all().await?;
    let reports = state
        .status
        .snapshot()
        .await
        .into_iter()
        .map(|status| {
            let watermark = persisted.iter().find(|w| w.view_name == status.view_model);
            ViewReport {
                persisted_watermark: watermark.map_or(0, |w| w.position),
                persisted_at: watermark.map(|w| w.updated_at),
                reset_pending: watermark.is_some_and(|w| w.reset_requested),
                status,
            }
        })
        .collect();
    Ok(Json(reports))
}

/// POST /views/{view}/reset
///
/// Accepted on any instance. The lease holder of the view runs the rebuild.
async fn reset_view(
    State(state): State<AppState>,
    Path(view): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.resets.reset_view(&view).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Returns the router for view status and re-projection.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/views", get(list_views))
        .route("/views/{view}/reset", post(reset_view))
}
