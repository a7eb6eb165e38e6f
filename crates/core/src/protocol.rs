//! WebSocket wire protocol between embedded pages, dashboards, and the hub.
//!
//! Messages are JSON with an internally-tagged `"type"` discriminator and
//! camelCase fields, matching what the browser snippet and the dashboard
//! frontend exchange. Every event gets its own variant so the transport
//! boundary rejects unknown or malformed shapes instead of trusting
//! caller-provided fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::presence::PresenceRecord;
use crate::types::{DbId, ElementId, SiteId, Timestamp};

// ---------------------------------------------------------------------------
// Shared payload pieces
// ---------------------------------------------------------------------------

/// One entry of a page's content map, keyed by element id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMapEntry {
    /// Stable CSS path to the element.
    pub selector: String,
    /// The element's current text content (or value, for inputs).
    pub content: String,
    /// Tag/kind hint, e.g. `"h1"` or `"input"`.
    #[serde(rename = "type")]
    pub element_type: String,
}

/// One item of a dashboard bulk update, applied in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateItem {
    pub element_id: ElementId,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// Messages the hub accepts from embedded pages and dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Embedded page sends its full content snapshot on (re)connect and
    /// after a re-scan. Always a full map, never a diff.
    #[serde(rename = "content-map")]
    ContentMap {
        site_id: SiteId,
        url: String,
        content_map: BTreeMap<ElementId, ContentMapEntry>,
    },

    /// A dashboard pushes one edited element.
    #[serde(rename = "content-update")]
    ContentUpdate {
        site_id: SiteId,
        element_id: ElementId,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variant: Option<String>,
    },

    /// A dashboard attaches to the dashboard room for a site. Decoupled
    /// from the handshake because a dashboard user may attach after
    /// connecting.
    #[serde(rename = "join-dashboard")]
    JoinDashboard {
        site_id: SiteId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<DbId>,
    },

    /// A dashboard applies several edits at once; acknowledged with a
    /// single aggregate count.
    #[serde(rename = "bulk-update")]
    BulkUpdate { updates: Vec<BulkUpdateItem> },

    /// A dashboard announces it started editing an element (after having
    /// obtained a session token via the HTTP API).
    #[serde(rename = "start-editing")]
    StartEditing {
        site_id: SiteId,
        element_id: ElementId,
        session_token: String,
    },

    /// A dashboard announces it stopped editing an element.
    #[serde(rename = "end-editing")]
    EndEditing {
        site_id: SiteId,
        element_id: ElementId,
        session_token: String,
    },

    /// A dashboard refreshes its collaborator presence (active element,
    /// cursor, selection).
    #[serde(rename = "update-presence")]
    UpdatePresence {
        #[serde(flatten)]
        presence: PresenceRecord,
    },
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// Messages the hub emits to embedded pages and dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Sent to embedded pages of a site when a dashboard edited an element.
    /// Never echoed back to the editing dashboard.
    #[serde(rename = "content-update")]
    ContentUpdate {
        element_id: ElementId,
        content: String,
        language: String,
        variant: String,
    },

    /// Sent to a site's dashboards when an embedded page synced its
    /// content map.
    #[serde(rename = "content-map-updated")]
    ContentMapUpdated {
        site_id: SiteId,
        url: String,
        element_count: usize,
    },

    /// Sent to a site's other dashboards when one dashboard edited an
    /// element, with attribution.
    #[serde(rename = "content-updated")]
    ContentUpdated {
        element_id: ElementId,
        content: String,
        updated_by: Option<DbId>,
        timestamp: Timestamp,
    },

    /// Dashboard fan-out of a peer's `start-editing`.
    #[serde(rename = "editing-started")]
    EditingStarted {
        element_id: ElementId,
        user_id: Option<DbId>,
    },

    /// Dashboard fan-out of a peer's `end-editing`.
    #[serde(rename = "editing-ended")]
    EditingEnded {
        element_id: ElementId,
        user_id: Option<DbId>,
    },

    /// Dashboard fan-out of a peer's presence refresh.
    #[serde(rename = "presence-update")]
    PresenceUpdate {
        #[serde(flatten)]
        presence: PresenceRecord,
    },

    /// A dashboard collaborator disconnected.
    #[serde(rename = "presence-left")]
    PresenceLeft { user_id: DbId },

    /// Aggregate acknowledgment for a `bulk-update`. `persisted` is false
    /// when the hub is running without durable storage.
    #[serde(rename = "bulk-update-ack")]
    BulkUpdateAck {
        applied: usize,
        failed: usize,
        persisted: bool,
    },

    /// Generic request-level failure.
    #[serde(rename = "error")]
    Error { error: String },

    /// A `content-update` could not be applied.
    #[serde(rename = "update-error")]
    UpdateError { error: String },

    /// A `bulk-update` could not be applied at all.
    #[serde(rename = "bulk-update-error")]
    BulkUpdateError { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_map_round_trips_with_wire_names() {
        let json = serde_json::json!({
            "type": "content-map",
            "siteId": "s1",
            "url": "https://example.com/",
            "contentMap": {
                "h1-1": {"selector": "h1", "content": "Hello", "type": "h1"}
            }
        });

        let msg: ClientMessage = serde_json::from_value(json.clone()).unwrap();
        match &msg {
            ClientMessage::ContentMap {
                site_id,
                content_map,
                ..
            } => {
                assert_eq!(site_id, "s1");
                assert_eq!(content_map["h1-1"].content, "Hello");
                assert_eq!(content_map["h1-1"].element_type, "h1");
            }
            other => panic!("unexpected variant: {other:?}"),
        }

        assert_eq!(serde_json::to_value(&msg).unwrap(), json);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type": "drop-tables", "siteId": "s1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_content_updated_uses_camel_case() {
        let msg = ServerMessage::ContentUpdated {
            element_id: "h1-1".into(),
            content: "Bye".into(),
            updated_by: Some(7),
            timestamp: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "content-updated");
        assert_eq!(value["elementId"], "h1-1");
        assert_eq!(value["updatedBy"], 7);
    }
}
