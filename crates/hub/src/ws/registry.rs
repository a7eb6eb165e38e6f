use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use livetext_core::protocol::ServerMessage;
use livetext_core::types::{DbId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct Connection {
    /// The site room this connection belongs to. Mandatory: connections
    /// without a site id are rejected before registration.
    pub site_id: String,
    /// Whether the connection has joined the `dashboard:{site_id}` room.
    pub dashboard: bool,
    /// Collaborator id supplied with `join-dashboard`, if any.
    pub user_id: Option<DbId>,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

/// Summary of a connection handed back on removal, for disconnect cleanup.
pub struct RemovedConnection {
    pub site_id: String,
    pub dashboard: bool,
    pub user_id: Option<DbId>,
}

struct Inner {
    connections: HashMap<String, Connection>,
    /// Live socket count per site, maintained on join/disconnect. The
    /// entry is removed entirely when its count reaches zero.
    site_counts: HashMap<String, usize>,
}

/// Room-aware registry of all active WebSocket connections.
///
/// Every connection is a member of `site:{site_id}`; dashboards
/// additionally join `dashboard:{site_id}` via an explicit message after
/// connecting. Thread-safe via interior `RwLock`; designed to be wrapped
/// in `Arc` and shared across the application.
pub struct RoomRegistry {
    inner: RwLock<Inner>,
}

impl RoomRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                connections: HashMap::new(),
                site_counts: HashMap::new(),
            }),
        }
    }

    /// Register a new connection in its site room.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(
        &self,
        conn_id: String,
        site_id: String,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection {
            site_id: site_id.clone(),
            dashboard: false,
            user_id: None,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        let mut inner = self.inner.write().await;
        inner.connections.insert(conn_id, conn);
        *inner.site_counts.entry(site_id).or_insert(0) += 1;
        rx
    }

    /// Flag a connection as a dashboard member of its site.
    ///
    /// Returns `false` if the connection is unknown (already disconnected).
    pub async fn join_dashboard(&self, conn_id: &str, user_id: Option<DbId>) -> bool {
        let mut inner = self.inner.write().await;
        match inner.connections.get_mut(conn_id) {
            Some(conn) => {
                conn.dashboard = true;
                if user_id.is_some() {
                    conn.user_id = user_id;
                }
                true
            }
            None => false,
        }
    }

    /// Remove a connection by its ID, decrementing its site count.
    pub async fn remove(&self, conn_id: &str) -> Option<RemovedConnection> {
        let mut inner = self.inner.write().await;
        let conn = inner.connections.remove(conn_id)?;
        if let Some(count) = inner.site_counts.get_mut(&conn.site_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                inner.site_counts.remove(&conn.site_id);
            }
        }
        Some(RemovedConnection {
            site_id: conn.site_id,
            dashboard: conn.dashboard,
            user_id: conn.user_id,
        })
    }

    /// The site a connection belongs to, if it is still registered.
    pub async fn site_of(&self, conn_id: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .connections
            .get(conn_id)
            .map(|c| c.site_id.clone())
    }

    /// The user attached to a connection via `join-dashboard`, if any.
    pub async fn user_of(&self, conn_id: &str) -> Option<DbId> {
        self.inner
            .read()
            .await
            .connections
            .get(conn_id)
            .and_then(|c| c.user_id)
    }

    /// Send one message to one connection. Silently ignored if the
    /// connection is gone or its channel is closed.
    pub async fn send_to(&self, conn_id: &str, message: &ServerMessage) {
        let Some(text) = encode(message) else { return };
        let inner = self.inner.read().await;
        if let Some(conn) = inner.connections.get(conn_id) {
            let _ = conn.sender.send(Message::Text(text.into()));
        }
    }

    /// Broadcast to every member of `site:{site_id}`, optionally excluding
    /// one connection (the sender never re-applies its own change).
    ///
    /// Connections whose send channels are closed are silently skipped
    /// (they will be cleaned up on their next receive loop iteration).
    /// Returns the number of connections the message was sent to.
    pub async fn broadcast_to_site(
        &self,
        site_id: &str,
        message: &ServerMessage,
        except: Option<&str>,
    ) -> usize {
        let Some(text) = encode(message) else { return 0 };
        let inner = self.inner.read().await;
        let mut count = 0;
        for (id, conn) in inner.connections.iter() {
            if conn.site_id != site_id || except == Some(id.as_str()) {
                continue;
            }
            let _ = conn.sender.send(Message::Text(text.clone().into()));
            count += 1;
        }
        count
    }

    /// Broadcast to every member of `dashboard:{site_id}`, optionally
    /// excluding one connection. Returns the number of recipients.
    pub async fn broadcast_to_dashboards(
        &self,
        site_id: &str,
        message: &ServerMessage,
        except: Option<&str>,
    ) -> usize {
        let Some(text) = encode(message) else { return 0 };
        let inner = self.inner.read().await;
        let mut count = 0;
        for (id, conn) in inner.connections.iter() {
            if conn.site_id != site_id || !conn.dashboard || except == Some(id.as_str()) {
                continue;
            }
            let _ = conn.sender.send(Message::Text(text.clone().into()));
            count += 1;
        }
        count
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Snapshot of live connection counts per site, for the metrics
    /// endpoint.
    pub async fn site_connection_counts(&self) -> HashMap<String, usize> {
        self.inner.read().await.site_counts.clone()
    }

    /// Send a Close frame to every connection, then clear the registry.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut inner = self.inner.write().await;
        let count = inner.connections.len();
        for conn in inner.connections.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        inner.connections.clear();
        inner.site_counts.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let inner = self.inner.read().await;
        for conn in inner.connections.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a server message for the wire. Serialization of our own
/// types cannot realistically fail; if it does, log and drop the message
/// rather than tearing down the connection.
fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize server message");
            None
        }
    }
}
