//! Editing session model and DTOs.

use livetext_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `editing_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EditingSession {
    pub id: DbId,
    pub token: String,
    pub site_id: String,
    pub element_id: String,
    pub user_id: DbId,
    pub granted_permissions: Vec<String>,
    pub started_at: Timestamp,
    pub expires_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An active session joined with user display info, for the dashboard's
/// "being edited by X" indicator.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActiveSessionInfo {
    pub element_id: String,
    pub user_id: DbId,
    pub user_email: String,
    pub display_name: String,
    pub started_at: Timestamp,
    pub expires_at: Timestamp,
}
