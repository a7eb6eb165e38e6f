//! Editing session rules: token generation and TTL constants.
//!
//! This module lives in `core` (zero internal deps) so the hub and the
//! repository layer share the same session constants. Activity itself is
//! decided in SQL: a session is active while un-ended and unexpired, and
//! expiry is lazy (no background sweep).

use rand::Rng;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default session lifetime in minutes.
pub const SESSION_TTL_MINS: i64 = 30;

/// Length of the generated session token (alphanumeric characters).
pub const TOKEN_LENGTH: usize = 48;

/// Denial reason when another user holds an active session on the element.
pub const REASON_ELEMENT_BUSY: &str = "Content is currently being edited by another user";

// ---------------------------------------------------------------------------
// Token generation
// ---------------------------------------------------------------------------

/// Generate a fresh opaque session token.
///
/// Tokens are bearer credentials for ending a session; they are returned
/// to the grantee once and stored verbatim (they gate nothing beyond the
/// session row they name).
pub fn generate_session_token() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
