//! Permission grant models. These tables are owned by the main
//! application; the hub only reads them.

use livetext_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `site_permissions` table. Exactly one of `user_id` /
/// `team_id` is set.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SitePermission {
    pub id: DbId,
    pub site_id: String,
    pub user_id: Option<DbId>,
    pub team_id: Option<DbId>,
    pub role: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `team_members` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TeamMember {
    pub id: DbId,
    pub team_id: DbId,
    pub user_id: DbId,
    pub role: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A team-scoped grant on a site, paired with the caller's membership role
/// within that team (if any). Used by the team-derived fallback lookup.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TeamSiteGrant {
    pub team_id: DbId,
    /// The role the team was granted on the site.
    pub site_role: String,
    /// The caller's role within the team, `None` if not a member.
    pub member_role: Option<String>,
}
