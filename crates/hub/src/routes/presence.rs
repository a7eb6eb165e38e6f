//! Presence snapshot for dashboards.
//!
//! Live presence changes arrive over WebSocket; this endpoint gives a
//! newly attached dashboard the current picture without waiting for the
//! next refresh from each collaborator.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/presence/{site_id}
async fn get_site_presence(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> impl IntoResponse {
    let records = state.presence.list_for_site(&site_id).await;
    Json(DataResponse { data: records })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/presence/{site_id}", get(get_site_presence))
}
