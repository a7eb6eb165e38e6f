//! Ephemeral collaborator presence types.
//!
//! Presence is never persisted: the hub keeps one record per dashboard
//! connection and drops it on disconnect.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, ElementId, Timestamp};

/// A text range within an element's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub start: usize,
    pub end: usize,
}

/// One collaborator's live status on a site.
///
/// Overwritten wholesale on every `update-presence` message; cursor-only
/// updates are the same record with only the cursor fields populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub user_id: DbId,
    pub user_email: String,
    /// The element the user is focused on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<ElementId>,
    /// Caret offset within the element's content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionRange>,
    pub last_activity: Timestamp,
}
