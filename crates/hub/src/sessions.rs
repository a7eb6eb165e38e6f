//! The editing session manager: time-bound exclusive edit claims.
//!
//! Grants are gated by the permission resolver and by the exclusivity
//! check; all failure paths, including storage failures, come back as
//! structured denials with a displayable reason, never as errors or
//! panics. The dashboard lets the user retry explicitly.

use livetext_core::roles::{self, CONTENT_EDIT_ROLES};
use livetext_core::session::{generate_session_token, REASON_ELEMENT_BUSY};
use livetext_core::types::{DbId, Timestamp};
use livetext_db::models::session::ActiveSessionInfo;
use livetext_db::repositories::{ContentRepo, EditingSessionRepo};
use livetext_db::DbPool;
use serde::Serialize;

/// Outcome of a session start attempt. On denial `token` is absent and
/// `reason` carries the human-readable explanation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStart {
    pub granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SessionStart {
    fn granted(token: String, expires_at: Timestamp) -> Self {
        Self {
            granted: true,
            token: Some(token),
            expires_at: Some(expires_at),
            reason: None,
        }
    }

    fn denied(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            token: None,
            expires_at: None,
            reason: Some(reason.into()),
        }
    }
}

/// Issues, validates, and revokes exclusive editing sessions.
pub struct EditingSessionManager;

impl EditingSessionManager {
    /// Start an editing session on an element for a user.
    ///
    /// Grant path: resolve the owning site, check the content-edit
    /// permission, lazily close expired sessions, deny if another user
    /// holds the element, defensively end the caller's own stale
    /// sessions, then insert a fresh token row.
    pub async fn start(pool: &DbPool, user_id: DbId, element_id: &str) -> SessionStart {
        let site_id = match ContentRepo::site_for_element(pool, element_id).await {
            Ok(Some(site_id)) => site_id,
            Ok(None) => return SessionStart::denied("Unknown content element"),
            Err(e) => {
                tracing::error!(element_id = %element_id, error = %e, "Site lookup failed");
                return SessionStart::denied("Editing session could not be started");
            }
        };

        let check = match crate::permissions::PermissionResolver::check_site_permission(
            pool,
            user_id,
            &site_id,
            CONTENT_EDIT_ROLES,
        )
        .await
        {
            Ok(check) => check,
            Err(e) => {
                tracing::error!(user_id, site_id = %site_id, error = %e, "Permission check failed");
                return SessionStart::denied("Editing session could not be started");
            }
        };
        if !check.granted {
            return SessionStart::denied(
                check
                    .reason
                    .unwrap_or_else(|| "Permission denied".to_string()),
            );
        }
        let role = check.role.unwrap_or_default();

        // Expiry is lazy: close stale rows now so the partial unique
        // index reflects only truly active sessions.
        if let Err(e) = EditingSessionRepo::end_expired_for_element(pool, element_id).await {
            tracing::error!(element_id = %element_id, error = %e, "Expired session cleanup failed");
            return SessionStart::denied("Editing session could not be started");
        }

        match EditingSessionRepo::find_active_for_element(pool, element_id).await {
            Ok(Some(active)) if active.user_id != user_id => {
                return SessionStart::denied(REASON_ELEMENT_BUSY);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(element_id = %element_id, error = %e, "Active session lookup failed");
                return SessionStart::denied("Editing session could not be started");
            }
        }

        // Idempotent cleanup of the caller's own stale sessions before
        // the fresh grant.
        if let Err(e) =
            EditingSessionRepo::end_user_sessions_for_element(pool, user_id, element_id).await
        {
            tracing::error!(element_id = %element_id, error = %e, "Own-session cleanup failed");
            return SessionStart::denied("Editing session could not be started");
        }

        let token = generate_session_token();
        let granted_permissions = roles::permissions_for_role(&role);

        match EditingSessionRepo::acquire(
            pool,
            &site_id,
            element_id,
            user_id,
            &token,
            &granted_permissions,
        )
        .await
        {
            Ok(Some(session)) => {
                tracing::info!(
                    user_id,
                    site_id = %site_id,
                    element_id = %element_id,
                    expires_at = %session.expires_at,
                    "Editing session started"
                );
                SessionStart::granted(session.token, session.expires_at)
            }
            // Lost a concurrent race for the partial unique index.
            Ok(None) => SessionStart::denied(REASON_ELEMENT_BUSY),
            Err(e) => {
                tracing::error!(element_id = %element_id, error = %e, "Session insert failed");
                SessionStart::denied("Editing session could not be started")
            }
        }
    }

    /// End a session by token. Ending an already-ended (or unknown)
    /// session is a no-op success.
    pub async fn end(pool: &DbPool, token: &str) -> Result<(), sqlx::Error> {
        let ended = EditingSessionRepo::end_by_token(pool, token).await?;
        if ended {
            tracing::info!("Editing session ended");
        }
        Ok(())
    }

    /// Active sessions for an element with user display info, for the
    /// dashboard's "being edited by X" indicator.
    pub async fn active_for_element(
        pool: &DbPool,
        element_id: &str,
    ) -> Result<Vec<ActiveSessionInfo>, sqlx::Error> {
        EditingSessionRepo::list_active_with_users(pool, element_id).await
    }
}
