//! Well-known site/team role names and sufficiency checks.
//!
//! These must match the CHECK constraints in
//! `20260301000002_create_site_permissions.sql`.

/// Read-only access to site content.
pub const ROLE_VIEWER: &str = "viewer";
/// May edit content elements.
pub const ROLE_EDITOR: &str = "editor";
/// May edit content and manage collaborators.
pub const ROLE_MANAGER: &str = "manager";
/// Full control of the site.
pub const ROLE_OWNER: &str = "owner";

/// The set of all valid role names.
pub const VALID_ROLES: &[&str] = &[ROLE_VIEWER, ROLE_EDITOR, ROLE_MANAGER, ROLE_OWNER];

/// Roles that permit editing content elements.
pub const CONTENT_EDIT_ROLES: &[&str] = &[ROLE_EDITOR, ROLE_MANAGER, ROLE_OWNER];

/// Roles that permit managing a site's collaborators.
pub const SITE_MANAGE_ROLES: &[&str] = &[ROLE_MANAGER, ROLE_OWNER];

/// Permission names recorded on an editing session grant.
pub mod permissions {
    pub const VIEW: &str = "view";
    pub const EDIT: &str = "edit";
    pub const ADMIN: &str = "admin";
}

/// Returns `true` if the given role name is valid.
pub fn is_valid_role(role: &str) -> bool {
    VALID_ROLES.contains(&role)
}

/// The permissions an editing session grants to a holder with this role.
pub fn permissions_for_role(role: &str) -> Vec<String> {
    let perms: &[&str] = match role {
        ROLE_VIEWER => &[permissions::VIEW],
        ROLE_EDITOR => &[permissions::VIEW, permissions::EDIT],
        ROLE_MANAGER | ROLE_OWNER => {
            &[permissions::VIEW, permissions::EDIT, permissions::ADMIN]
        }
        _ => &[],
    };
    perms.iter().map(|p| p.to_string()).collect()
}

/// Set-membership sufficiency check.
///
/// There is no implicit hierarchy here: callers must list every acceptable
/// role explicitly (e.g. `&[ROLE_MANAGER, ROLE_OWNER]`). This matches the
/// permission resolver contract, where the required set travels with the
/// caller.
pub fn is_sufficient(role: &str, required: &[&str]) -> bool {
    required.contains(&role)
}
