//! HTTP endpoints for the editing session manager.
//!
//! Denials are 200 responses with `granted: false` and a displayable
//! reason; they are normal outcomes the dashboard shows inline, not
//! errors.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use livetext_core::error::CoreError;
use livetext_core::types::DbId;
use livetext_db::repositories::UserRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::sessions::EditingSessionManager;
use crate::state::AppState;

/// DTO for starting a session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub user_id: DbId,
    pub element_id: String,
}

/// DTO for ending a session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pub token: String,
}

/// POST /api/v1/sessions/start
async fn start_session(
    State(state): State<AppState>,
    Json(input): Json<StartSessionRequest>,
) -> AppResult<impl IntoResponse> {
    let pool = state.pool.as_ref().ok_or(AppError::StorageUnavailable)?;

    if input.element_id.trim().is_empty() {
        return Err(AppError::BadRequest("elementId must not be empty".into()));
    }

    // Unknown users are a caller bug, not a denial.
    if UserRepo::get(pool, input.user_id).await?.is_none() {
        return Err(CoreError::NotFound {
            entity: "user",
            id: input.user_id.to_string(),
        }
        .into());
    }

    let outcome = EditingSessionManager::start(pool, input.user_id, &input.element_id).await;
    Ok(Json(outcome))
}

/// POST /api/v1/sessions/end
///
/// Idempotent: ending an already-ended or unknown token succeeds.
async fn end_session(
    State(state): State<AppState>,
    Json(input): Json<EndSessionRequest>,
) -> AppResult<impl IntoResponse> {
    let pool = state.pool.as_ref().ok_or(AppError::StorageUnavailable)?;

    EditingSessionManager::end(pool, &input.token).await?;
    Ok(Json(DataResponse {
        data: serde_json::json!({ "ended": true }),
    }))
}

/// GET /api/v1/sessions/element/{element_id}
///
/// Active sessions with user display info, for "being edited by X".
async fn get_element_sessions(
    State(state): State<AppState>,
    Path(element_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let pool = state.pool.as_ref().ok_or(AppError::StorageUnavailable)?;

    let sessions = EditingSessionManager::active_for_element(pool, &element_id).await?;
    Ok(Json(DataResponse { data: sessions }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions/start", post(start_session))
        .route("/sessions/end", post(end_session))
        .route("/sessions/element/{element_id}", get(get_element_sessions))
}
