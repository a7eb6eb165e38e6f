//! Routing tests for `Hub` in degraded (storage-less) mode.
//!
//! With no pool configured the hub skips persistence but routes and
//! broadcasts exactly as it would with storage, which makes the full
//! fan-out matrix testable without a database: who receives what when a
//! page syncs its content map, a dashboard edits an element, a bulk
//! update lands, or presence changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use livetext_core::presence::PresenceRecord;
use livetext_core::protocol::{BulkUpdateItem, ClientMessage, ContentMapEntry, ServerMessage};
use livetext_hub::hub::Hub;
use livetext_hub::presence::PresenceTracker;
use livetext_hub::ws::RoomRegistry;
use tokio::sync::mpsc::UnboundedReceiver;

struct Harness {
    registry: Arc<RoomRegistry>,
    hub: Hub,
}

impl Harness {
    fn new() -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let presence = Arc::new(PresenceTracker::new());
        let hub = Hub::new(Arc::clone(&registry), presence, None);
        Self { registry, hub }
    }

    /// Register an embedded-page connection in a site room.
    async fn add_page(&self, conn_id: &str, site_id: &str) -> UnboundedReceiver<Message> {
        self.registry
            .add(conn_id.to_string(), site_id.to_string())
            .await
    }

    /// Register a dashboard connection for a site, attributed to a user.
    async fn add_dashboard(
        &self,
        conn_id: &str,
        site_id: &str,
        user_id: i64,
    ) -> UnboundedReceiver<Message> {
        let rx = self.add_page(conn_id, site_id).await;
        self.hub
            .dispatch(
                conn_id,
                ClientMessage::JoinDashboard {
                    site_id: site_id.to_string(),
                    user_id: Some(user_id),
                },
            )
            .await;
        rx
    }
}

async fn recv_message(rx: &mut UnboundedReceiver<Message>) -> ServerMessage {
    match rx.recv().await.expect("channel should deliver a frame") {
        Message::Text(text) => serde_json::from_str(text.as_str()).expect("valid server message"),
        other => panic!("Expected Text frame, got: {other:?}"),
    }
}

fn presence_record(user_id: i64) -> PresenceRecord {
    PresenceRecord {
        user_id,
        user_email: format!("user{user_id}@example.com"),
        element_id: Some("h1-1".to_string()),
        cursor_position: Some(4),
        selection: None,
        last_activity: chrono::Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Test: content-map is summarized to dashboards, never echoed to pages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn content_map_summary_reaches_dashboards_only() {
    let h = Harness::new();
    let mut page_rx = h.add_page("page", "site-a").await;
    let mut peer_page_rx = h.add_page("peer-page", "site-a").await;
    let mut dash_rx = h.add_dashboard("dash", "site-a", 1).await;

    let mut content_map = BTreeMap::new();
    content_map.insert(
        "h1-1".to_string(),
        ContentMapEntry {
            selector: "h1".to_string(),
            content: "Hello".to_string(),
            element_type: "h1".to_string(),
        },
    );
    content_map.insert(
        "p-1".to_string(),
        ContentMapEntry {
            selector: "p".to_string(),
            content: "Body".to_string(),
            element_type: "p".to_string(),
        },
    );

    h.hub
        .dispatch(
            "page",
            ClientMessage::ContentMap {
                site_id: "site-a".to_string(),
                url: "https://example.com/".to_string(),
                content_map,
            },
        )
        .await;

    let msg = recv_message(&mut dash_rx).await;
    match msg {
        ServerMessage::ContentMapUpdated {
            site_id,
            url,
            element_count,
        } => {
            assert_eq!(site_id, "site-a");
            assert_eq!(url, "https://example.com/");
            assert_eq!(element_count, 2);
        }
        other => panic!("Expected content-map-updated, got: {other:?}"),
    }

    assert!(page_rx.try_recv().is_err(), "sender must not be echoed");
    assert!(peer_page_rx.try_recv().is_err(), "pages are not dashboards");
}

// ---------------------------------------------------------------------------
// Test: content-update fan-out shapes per receiver kind
// ---------------------------------------------------------------------------

#[tokio::test]
async fn content_update_fans_out_to_pages_and_dashboards() {
    let h = Harness::new();
    let mut page_rx = h.add_page("page", "site-a").await;
    let mut editor_rx = h.add_dashboard("editor", "site-a", 1).await;
    let mut peer_dash_rx = h.add_dashboard("peer-dash", "site-a", 2).await;
    let mut other_site_rx = h.add_page("other-page", "site-b").await;

    h.hub
        .dispatch(
            "editor",
            ClientMessage::ContentUpdate {
                site_id: "site-a".to_string(),
                element_id: "h1-1".to_string(),
                content: "Bye".to_string(),
                language: None,
                variant: None,
            },
        )
        .await;

    // Embedded page: the bare update with language/variant defaults.
    let msg = recv_message(&mut page_rx).await;
    match msg {
        ServerMessage::ContentUpdate {
            element_id,
            content,
            language,
            variant,
        } => {
            assert_eq!(element_id, "h1-1");
            assert_eq!(content, "Bye");
            assert_eq!(language, "en");
            assert_eq!(variant, "default");
        }
        other => panic!("Expected content-update, got: {other:?}"),
    }
    assert!(page_rx.try_recv().is_err());

    // Peer dashboard: the site-room update, then the attributed event.
    let msg = recv_message(&mut peer_dash_rx).await;
    assert!(matches!(msg, ServerMessage::ContentUpdate { .. }));
    let msg = recv_message(&mut peer_dash_rx).await;
    match msg {
        ServerMessage::ContentUpdated {
            element_id,
            content,
            updated_by,
            ..
        } => {
            assert_eq!(element_id, "h1-1");
            assert_eq!(content, "Bye");
            assert_eq!(updated_by, Some(1));
        }
        other => panic!("Expected content-updated, got: {other:?}"),
    }

    assert!(editor_rx.try_recv().is_err(), "sender must not be echoed");
    assert!(other_site_rx.try_recv().is_err(), "other sites are isolated");
}

// ---------------------------------------------------------------------------
// Test: bulk-update acknowledges aggregate counts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bulk_update_acks_counts_and_marks_unpersisted() {
    let h = Harness::new();
    let mut page_rx = h.add_page("page", "site-a").await;
    let mut editor_rx = h.add_dashboard("editor", "site-a", 1).await;

    h.hub
        .dispatch(
            "editor",
            ClientMessage::BulkUpdate {
                updates: vec![
                    BulkUpdateItem {
                        element_id: "h1-1".to_string(),
                        content: "One".to_string(),
                    },
                    BulkUpdateItem {
                        element_id: "p-1".to_string(),
                        content: "Two".to_string(),
                    },
                ],
            },
        )
        .await;

    // The page receives one update per item, in request order.
    for expected in ["h1-1", "p-1"] {
        let msg = recv_message(&mut page_rx).await;
        assert!(
            matches!(msg, ServerMessage::ContentUpdate { ref element_id, .. } if element_id == expected)
        );
    }

    // The sender receives only the acknowledgment.
    let msg = recv_message(&mut editor_rx).await;
    match msg {
        ServerMessage::BulkUpdateAck {
            applied,
            failed,
            persisted,
        } => {
            assert_eq!(applied, 2);
            assert_eq!(failed, 0);
            assert!(!persisted, "degraded mode must report persisted=false");
        }
        other => panic!("Expected bulk-update-ack, got: {other:?}"),
    }
    assert!(editor_rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: empty bulk-update is rejected with bulk-update-error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_bulk_update_is_rejected() {
    let h = Harness::new();
    let mut editor_rx = h.add_dashboard("editor", "site-a", 1).await;

    h.hub
        .dispatch("editor", ClientMessage::BulkUpdate { updates: vec![] })
        .await;

    let msg = recv_message(&mut editor_rx).await;
    assert!(matches!(msg, ServerMessage::BulkUpdateError { .. }));
}

// ---------------------------------------------------------------------------
// Test: start-editing notifies the other dashboards with attribution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_editing_notifies_peer_dashboards() {
    let h = Harness::new();
    let mut editor_rx = h.add_dashboard("editor", "site-a", 1).await;
    let mut peer_dash_rx = h.add_dashboard("peer-dash", "site-a", 2).await;
    let mut page_rx = h.add_page("page", "site-a").await;

    h.hub
        .dispatch(
            "editor",
            ClientMessage::StartEditing {
                site_id: "site-a".to_string(),
                element_id: "h1-1".to_string(),
                session_token: "tok".to_string(),
            },
        )
        .await;

    let msg = recv_message(&mut peer_dash_rx).await;
    match msg {
        ServerMessage::EditingStarted {
            element_id,
            user_id,
        } => {
            assert_eq!(element_id, "h1-1");
            assert_eq!(user_id, Some(1));
        }
        other => panic!("Expected editing-started, got: {other:?}"),
    }

    assert!(editor_rx.try_recv().is_err());
    assert!(page_rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: presence refresh fans out; disconnect broadcasts presence-left
// ---------------------------------------------------------------------------

#[tokio::test]
async fn presence_update_and_disconnect_fan_out() {
    let h = Harness::new();
    let _editor_rx = h.add_dashboard("editor", "site-a", 1).await;
    let mut peer_dash_rx = h.add_dashboard("peer-dash", "site-a", 2).await;

    h.hub
        .dispatch(
            "editor",
            ClientMessage::UpdatePresence {
                presence: presence_record(1),
            },
        )
        .await;

    let msg = recv_message(&mut peer_dash_rx).await;
    match msg {
        ServerMessage::PresenceUpdate { presence } => {
            assert_eq!(presence.user_id, 1);
            assert_eq!(presence.element_id.as_deref(), Some("h1-1"));
        }
        other => panic!("Expected presence-update, got: {other:?}"),
    }

    h.hub.handle_disconnect("editor").await;

    let msg = recv_message(&mut peer_dash_rx).await;
    assert!(matches!(msg, ServerMessage::PresenceLeft { user_id } if user_id == 1));
    assert_eq!(h.registry.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: disconnect without presence is silent
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disconnect_without_presence_is_silent() {
    let h = Harness::new();
    let _page_rx = h.add_page("page", "site-a").await;
    let mut dash_rx = h.add_dashboard("dash", "site-a", 1).await;

    h.hub.handle_disconnect("page").await;

    assert!(dash_rx.try_recv().is_err());
    assert_eq!(h.registry.connection_count().await, 1);
}
