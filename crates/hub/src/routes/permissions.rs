//! HTTP endpoint over the permission resolver, used by the dashboard to
//! pre-gate UI affordances.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use livetext_core::roles;
use livetext_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::permissions::PermissionResolver;
use crate::state::AppState;

/// Query parameters for a site permission check. `roles` is the
/// comma-separated set of acceptable roles; there is no implicit
/// hierarchy, so the caller must list every role it accepts.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckParams {
    pub user_id: DbId,
    pub site_id: String,
    pub roles: String,
}

/// GET /api/v1/permissions/check
async fn check_permission(
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
) -> AppResult<impl IntoResponse> {
    let pool = state.pool.as_ref().ok_or(AppError::StorageUnavailable)?;

    let required: Vec<&str> = params
        .roles
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if required.is_empty() {
        return Err(AppError::BadRequest("roles must not be empty".into()));
    }
    if let Some(unknown) = required.iter().find(|r| !roles::is_valid_role(r)) {
        return Err(AppError::BadRequest(format!("Unknown role '{unknown}'")));
    }

    let check = PermissionResolver::check_site_permission(
        pool,
        params.user_id,
        &params.site_id,
        &required,
    )
    .await?;

    Ok(Json(check))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/permissions/check", get(check_permission))
}
