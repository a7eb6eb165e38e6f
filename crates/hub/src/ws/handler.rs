use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use livetext_core::protocol::{ClientMessage, ServerMessage};
use serde::Deserialize;

use crate::state::AppState;

/// Handshake query parameters. `site_id` is mandatory; `dashboard=true`
/// pre-flags the connection as a dashboard (it may also join later via
/// a `join-dashboard` message).
#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub site_id: Option<String>,
    #[serde(default)]
    pub dashboard: bool,
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// Connections lacking a `site_id` query parameter are rejected before
/// the upgrade; they are never registered.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let Some(site_id) = params.site_id.filter(|s| !s.is_empty()) else {
        tracing::warn!("WebSocket handshake rejected: missing site_id");
        return (StatusCode::BAD_REQUEST, "site_id query parameter is required")
            .into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, site_id, params.dashboard))
        .into_response()
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with the room registry.
///   2. Spawns a sender task that forwards messages from the registry channel.
///   3. Parses and dispatches inbound messages on the current task.
///   4. Cleans up (registry, presence, departure broadcast) on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, site_id: String, dashboard: bool) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, site_id = %site_id, dashboard, "WebSocket connected");

    // Register and get the receiver for outbound messages.
    let mut rx = state.registry.add(conn_id.clone(), site_id.clone()).await;
    if dashboard {
        state.registry.join_dashboard(&conn_id, None).await;
    }

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: parse and dispatch inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => state.hub.dispatch(&conn_id, msg).await,
                Err(e) => {
                    tracing::warn!(conn_id = %conn_id, error = %e, "Malformed client message");
                    state
                        .registry
                        .send_to(
                            &conn_id,
                            &ServerMessage::Error {
                                error: "Unrecognized message".to_string(),
                            },
                        )
                        .await;
                }
            },
            Ok(_) => {
                // Binary/Ping frames carry no protocol traffic.
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: registry removal, presence drop + departure broadcast.
    state.hub.handle_disconnect(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}
