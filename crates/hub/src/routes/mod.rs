pub mod content;
pub mod health;
pub mod permissions;
pub mod presence;
pub mod sessions;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                   WebSocket (site_id query required)
///
/// /sessions/start                       start an editing session (POST)
/// /sessions/end                         end a session by token (POST)
/// /sessions/element/{element_id}        active sessions for an element (GET)
///
/// /permissions/check                    resolve a site permission (GET)
///
/// /presence/{site_id}                   current presence snapshot (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(sessions::router())
        .merge(permissions::router())
        .merge(presence::router())
}
