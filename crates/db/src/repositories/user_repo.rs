//! Minimal lookups against the collaborator directory.

use livetext_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::User;

/// Column list for `users` queries.
const USER_COLUMNS: &str = "id, email, display_name, created_at, updated_at";

/// Read-only user lookups (account management lives elsewhere).
pub struct UserRepo;

impl UserRepo {
    /// Fetch a user by id.
    pub async fn get(pool: &PgPool, user_id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}
