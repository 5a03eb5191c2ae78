//! Warden server — hosts the spooler and exposes read models over HTTP.

pub mod config;
pub mod error;
pub mod routes;
pub mod setup;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Builds the full router over `state`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::views::router())
        .nest("/api/v1/policies", routes::policies::router())
        .nest("/api/v1/iam", routes::members::router())
        .with_state(state)
}
