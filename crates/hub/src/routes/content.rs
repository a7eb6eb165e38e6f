//! Polling fallback for clients whose WebSocket never connected.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use livetext_db::repositories::ContentRepo;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// One element's current content, in the same shape the WebSocket
/// `content-update` event uses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub element_id: String,
    pub content: String,
    pub language: String,
    pub variant: String,
}

/// GET /content/{site_id}
///
/// The full current content of a site. Polling clients apply the items
/// through the same inbound handler as pushed updates.
async fn get_site_content(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let pool = state.pool.as_ref().ok_or(AppError::StorageUnavailable)?;

    let elements = ContentRepo::list_for_site(pool, &site_id).await?;
    let items: Vec<ContentItem> = elements
        .into_iter()
        .map(|e| ContentItem {
            element_id: e.element_id,
            content: e.current_content,
            language: e.language,
            variant: e.variant,
        })
        .collect();

    Ok(Json(items))
}

/// Mount the polling endpoint (root-level, next to /health).
pub fn router() -> Router<AppState> {
    Router::new().route("/content/{site_id}", get(get_site_content))
}
