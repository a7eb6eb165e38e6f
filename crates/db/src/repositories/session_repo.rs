//! Repository for the `editing_sessions` table.
//!
//! The partial unique index `uq_editing_sessions_active` (one un-ended
//! session per element) is what makes `acquire` race-free: concurrent
//! grants resolve to exactly one winner at the database.

use livetext_core::session::SESSION_TTL_MINS;
use livetext_core::types::DbId;
use sqlx::PgPool;

use crate::models::session::{ActiveSessionInfo, EditingSession};

/// Column list for `editing_sessions` queries.
const SESSION_COLUMNS: &str = "id, token, site_id, element_id, user_id, granted_permissions, \
                               started_at, expires_at, ended_at, created_at, updated_at";

/// Provides CRUD operations for exclusive editing sessions.
pub struct EditingSessionRepo;

impl EditingSessionRepo {
    /// Attempt to insert a new active session for an element.
    ///
    /// Uses `INSERT ... ON CONFLICT DO NOTHING` against the partial unique
    /// index on un-ended sessions. Returns `None` when another un-ended
    /// session already exists (callers close expired rows first via
    /// [`end_expired_for_element`](Self::end_expired_for_element)).
    pub async fn acquire(
        pool: &PgPool,
        site_id: &str,
        element_id: &str,
        user_id: DbId,
        token: &str,
        granted_permissions: &[String],
    ) -> Result<Option<EditingSession>, sqlx::Error> {
        let query = format!(
            "INSERT INTO editing_sessions \
                 (token, site_id, element_id, user_id, granted_permissions, expires_at) \
             VALUES ($1, $2, $3, $4, $5, NOW() + INTERVAL '{SESSION_TTL_MINS} minutes') \
             ON CONFLICT (site_id, element_id) WHERE ended_at IS NULL \
             DO NOTHING \
             RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, EditingSession>(&query)
            .bind(token)
            .bind(site_id)
            .bind(element_id)
            .bind(user_id)
            .bind(granted_permissions)
            .fetch_optional(pool)
            .await
    }

    /// Close expired-but-unended sessions for an element.
    ///
    /// Expiry is lazy (no background sweep), so this runs at the start of
    /// every acquire to make room under the partial unique index. Returns
    /// the number of rows closed.
    pub async fn end_expired_for_element(
        pool: &PgPool,
        element_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE editing_sessions SET ended_at = expires_at, updated_at = NOW() \
             WHERE element_id = $1 AND ended_at IS NULL AND expires_at <= NOW()",
        )
        .bind(element_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// The currently active session for an element, if any.
    pub async fn find_active_for_element(
        pool: &PgPool,
        element_id: &str,
    ) -> Result<Option<EditingSession>, sqlx::Error> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM editing_sessions \
             WHERE element_id = $1 AND ended_at IS NULL AND expires_at > NOW()"
        );
        sqlx::query_as::<_, EditingSession>(&query)
            .bind(element_id)
            .fetch_optional(pool)
            .await
    }

    /// Defensively close any of one user's own un-ended sessions on an
    /// element before granting them a fresh one. Idempotent.
    pub async fn end_user_sessions_for_element(
        pool: &PgPool,
        user_id: DbId,
        element_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE editing_sessions SET ended_at = NOW(), updated_at = NOW() \
             WHERE user_id = $1 AND element_id = $2 AND ended_at IS NULL",
        )
        .bind(user_id)
        .bind(element_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark a session ended by its token.
    ///
    /// Ending an already-ended session is a no-op; returns `true` if an
    /// un-ended row was closed.
    pub async fn end_by_token(pool: &PgPool, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE editing_sessions SET ended_at = NOW(), updated_at = NOW() \
             WHERE token = $1 AND ended_at IS NULL",
        )
        .bind(token)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Active sessions for an element joined with user display info.
    pub async fn list_active_with_users(
        pool: &PgPool,
        element_id: &str,
    ) -> Result<Vec<ActiveSessionInfo>, sqlx::Error> {
        sqlx::query_as::<_, ActiveSessionInfo>(
            "SELECT s.element_id, s.user_id, u.email AS user_email, u.display_name, \
                    s.started_at, s.expires_at \
             FROM editing_sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.element_id = $1 AND s.ended_at IS NULL AND s.expires_at > NOW() \
             ORDER BY s.started_at",
        )
        .bind(element_id)
        .fetch_all(pool)
        .await
    }
}
