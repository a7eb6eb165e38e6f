//! Read-only repository over the permission tables.
//!
//! These tables are owned by the main application; the hub never writes
//! them. The resolver's precedence rule (direct grant beats team-derived)
//! lives one layer up; this repo only fetches rows.

use livetext_core::types::DbId;
use sqlx::PgPool;

use crate::models::permission::{SitePermission, TeamMember, TeamSiteGrant};

/// Column list for `site_permissions` queries.
const PERMISSION_COLUMNS: &str = "id, site_id, user_id, team_id, role, created_at, updated_at";

/// Column list for `team_members` queries.
const MEMBER_COLUMNS: &str = "id, team_id, user_id, role, created_at, updated_at";

/// Lookup operations for permission grants and team membership.
pub struct PermissionRepo;

impl PermissionRepo {
    /// A user's membership row in one team, if any.
    pub async fn get_team_membership(
        pool: &PgPool,
        team_id: DbId,
        user_id: DbId,
    ) -> Result<Option<TeamMember>, sqlx::Error> {
        let query = format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE team_id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, TeamMember>(&query)
            .bind(team_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// A user's direct grant on a site, if any.
    pub async fn get_direct_site_permission(
        pool: &PgPool,
        site_id: &str,
        user_id: DbId,
    ) -> Result<Option<SitePermission>, sqlx::Error> {
        let query = format!(
            "SELECT {PERMISSION_COLUMNS} FROM site_permissions \
             WHERE site_id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, SitePermission>(&query)
            .bind(site_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// All team grants on a site, each paired with the caller's membership
    /// role within that team (`NULL` when the caller is not a member).
    pub async fn get_team_site_grants(
        pool: &PgPool,
        site_id: &str,
        user_id: DbId,
    ) -> Result<Vec<TeamSiteGrant>, sqlx::Error> {
        sqlx::query_as::<_, TeamSiteGrant>(
            "SELECT p.team_id, p.role AS site_role, m.role AS member_role \
             FROM site_permissions p \
             LEFT JOIN team_members m ON m.team_id = p.team_id AND m.user_id = $2 \
             WHERE p.site_id = $1 AND p.team_id IS NOT NULL \
             ORDER BY p.team_id",
        )
        .bind(site_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
