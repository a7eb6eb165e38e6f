//! Permission resolution for team and site scopes.
//!
//! Role sufficiency is a plain set-membership test against the required
//! roles the caller supplies; there is no implicit hierarchy. For site
//! scope, a direct grant always takes precedence over team-derived
//! lookups; the two are never merged.

use livetext_core::roles;
use livetext_core::types::DbId;
use livetext_db::repositories::PermissionRepo;
use livetext_db::DbPool;
use serde::Serialize;

/// The outcome of a permission check. Denials are normal results, not
/// errors: the reason is meant for inline display in the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionCheck {
    pub granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PermissionCheck {
    pub fn granted(role: impl Into<String>) -> Self {
        Self {
            granted: true,
            role: Some(role.into()),
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            role: None,
            reason: Some(reason.into()),
        }
    }
}

fn insufficient_role_reason(required: &[&str]) -> String {
    format!(
        "This action requires one of the following roles: {}",
        required.join(", ")
    )
}

/// Answers "can user U do action A on scope E".
pub struct PermissionResolver;

impl PermissionResolver {
    /// Team scope: check the caller's membership row for the team.
    pub async fn check_team_permission(
        pool: &DbPool,
        user_id: DbId,
        team_id: DbId,
        required: &[&str],
    ) -> Result<PermissionCheck, sqlx::Error> {
        let member = PermissionRepo::get_team_membership(pool, team_id, user_id).await?;

        Ok(match member {
            None => PermissionCheck::denied("You are not a member of this team"),
            Some(m) if roles::is_sufficient(&m.role, required) => PermissionCheck::granted(m.role),
            Some(_) => PermissionCheck::denied(insufficient_role_reason(required)),
        })
    }

    /// Site scope: direct grant first; only when no direct row exists,
    /// fall back to team-derived permission.
    ///
    /// Team-derived: for each team granted a role on the site, the
    /// caller's membership role within that team is tested against the
    /// required set; the first sufficient membership wins.
    pub async fn check_site_permission(
        pool: &DbPool,
        user_id: DbId,
        site_id: &str,
        required: &[&str],
    ) -> Result<PermissionCheck, sqlx::Error> {
        if let Some(direct) = PermissionRepo::get_direct_site_permission(pool, site_id, user_id).await? {
            // Direct precedence: an insufficient direct role is a denial
            // even if a team grant would have sufficed.
            return Ok(if roles::is_sufficient(&direct.role, required) {
                PermissionCheck::granted(direct.role)
            } else {
                PermissionCheck::denied(insufficient_role_reason(required))
            });
        }

        let grants = PermissionRepo::get_team_site_grants(pool, site_id, user_id).await?;
        let mut saw_membership = false;
        for grant in &grants {
            if let Some(member_role) = &grant.member_role {
                saw_membership = true;
                if roles::is_sufficient(member_role, required) {
                    return Ok(PermissionCheck::granted(member_role.clone()));
                }
            }
        }

        Ok(if saw_membership {
            PermissionCheck::denied(insufficient_role_reason(required))
        } else {
            PermissionCheck::denied("You do not have permission to access this site")
        })
    }
}
