use std::sync::Arc;

use crate::config::ServerConfig;
use crate::hub::Hub;
use crate::presence::PresenceTracker;
use crate::ws::RoomRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool. `None` puts the hub in degraded mode:
    /// routing and broadcasting still work, persistence is skipped.
    pub pool: Option<livetext_db::DbPool>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Room registry for WebSocket connections.
    pub registry: Arc<RoomRegistry>,
    /// Ephemeral dashboard presence, keyed by connection.
    pub presence: Arc<PresenceTracker>,
    /// Message router for inbound WebSocket traffic.
    pub hub: Arc<Hub>,
}

impl AppState {
    /// Wire up a fresh state: registry, presence tracker, and hub sharing
    /// the same storage handle.
    pub fn new(pool: Option<livetext_db::DbPool>, config: ServerConfig) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let presence = Arc::new(PresenceTracker::new());
        let hub = Arc::new(Hub::new(
            Arc::clone(&registry),
            Arc::clone(&presence),
            pool.clone(),
        ));
        Self {
            pool,
            config: Arc::new(config),
            registry,
            presence,
            hub,
        }
    }
}
