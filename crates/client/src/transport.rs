//! The client transport: a persistent WebSocket to the hub with a
//! polling fallback.
//!
//! State machine: `Disconnected → Connecting → Connected ⇄ Reconnecting`,
//! plus a terminal `PollingFallback` entered only when the socket never
//! connected at all. Reconnects are bounded by a fixed attempt budget
//! with a fixed delay between attempts.
//!
//! Transport errors never reach the host page: everything is logged and
//! recovered (or given up on) internally, and every public entry point
//! is safe to call whatever the connection state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use livetext_core::protocol::{ClientMessage, ContentMapEntry, ServerMessage};

use crate::dom::{Document, NodeId};
use crate::scanner;
use crate::{HIGHLIGHT_CLASS, ID_ATTR};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Transport tuning. The defaults match the embedded snippet's behavior.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Hub base URL, e.g. `http://localhost:3000`.
    pub server_url: String,
    /// The site this page belongs to.
    pub site_id: String,
    /// The page URL reported with content maps.
    pub page_url: String,
    /// Reconnect attempt budget before falling back or giving up.
    pub max_reconnect_attempts: u32,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Polling fallback interval.
    pub poll_interval: Duration,
    /// Quiet window after a burst of DOM mutations before re-scanning.
    pub rescan_debounce: Duration,
    /// How long the visual update acknowledgment stays on an element.
    pub highlight_duration: Duration,
}

impl TransportConfig {
    pub fn new(server_url: impl Into<String>, site_id: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            site_id: site_id.into(),
            page_url: page_url.into(),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(3),
            poll_interval: Duration::from_secs(30),
            rescan_debounce: Duration::from_millis(500),
            highlight_duration: Duration::from_secs(1),
        }
    }

    fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.server_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.server_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.server_url.clone()
        };
        format!("{base}/api/v1/ws?site_id={}", self.site_id)
    }

    fn poll_url(&self) -> String {
        format!("{}/content/{}", self.server_url, self.site_id)
    }
}

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal: the socket never connected; content is polled instead.
    PollingFallback,
}

// ---------------------------------------------------------------------------
// Reconnect policy
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum ReconnectAction {
    /// Wait the fixed delay, then try again.
    Retry,
    /// Attempts exhausted without ever connecting: switch to polling.
    FallBack,
    /// Attempts exhausted after a working connection dropped: stop.
    GiveUp,
}

/// Bounded-attempt reconnect bookkeeping (a counter, not a wall clock).
struct ReconnectPolicy {
    max_attempts: u32,
    attempts: u32,
    ever_connected: bool,
}

impl ReconnectPolicy {
    fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: 0,
            ever_connected: false,
        }
    }

    fn connected(&mut self) {
        self.ever_connected = true;
        self.attempts = 0;
    }

    fn on_failure(&mut self) -> ReconnectAction {
        self.attempts += 1;
        if self.attempts <= self.max_attempts {
            ReconnectAction::Retry
        } else if self.ever_connected {
            ReconnectAction::GiveUp
        } else {
            ReconnectAction::FallBack
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound handling
// ---------------------------------------------------------------------------

/// Apply a server message to the document.
///
/// Unknown element ids are ignored without error: the hub may know about
/// elements from other pages of the same site. Returns the updated node
/// so the caller can manage the transient highlight.
fn apply_server_message(doc: &mut Document, msg: &ServerMessage) -> Option<NodeId> {
    match msg {
        ServerMessage::ContentUpdate {
            element_id, content, ..
        } => {
            let node = doc.find_by_attribute(ID_ATTR, element_id)?;
            if doc.is_input_like(node) {
                doc.set_value(node, content);
            } else {
                doc.set_text(node, content);
            }
            doc.add_class(node, HIGHLIGHT_CLASS);
            Some(node)
        }
        // Dashboard-facing events; nothing to do on an embedded page.
        _ => None,
    }
}

/// One item of the polling endpoint's response, shaped like the pushed
/// `content-update` event.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollItem {
    element_id: String,
    content: String,
    #[allow(dead_code)]
    language: String,
    #[allow(dead_code)]
    variant: String,
}

// ---------------------------------------------------------------------------
// TransportManager
// ---------------------------------------------------------------------------

/// Owns the hub connection for one embedded page.
pub struct TransportManager {
    doc: Arc<Mutex<Document>>,
    config: Arc<TransportConfig>,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl TransportManager {
    /// Spawn the connection task and return the manager handle.
    pub fn start(doc: Arc<Mutex<Document>>, config: TransportConfig) -> Self {
        let config = Arc::new(config);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();

        tokio::spawn(run(
            Arc::clone(&doc),
            Arc::clone(&config),
            state_tx,
            outbound_rx,
            cancel.clone(),
        ));

        Self {
            doc,
            config,
            outbound: outbound_tx,
            state_rx,
            cancel,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Push one local edit to the hub. Safe to call in any state: the
    /// message is buffered while reconnecting, and dropped once the
    /// transport reaches a terminal state (polling fallback, gave up,
    /// destroyed).
    pub fn update(&self, element_id: impl Into<String>, content: impl Into<String>) {
        let _ = self.outbound.send(ClientMessage::ContentUpdate {
            site_id: self.config.site_id.clone(),
            element_id: element_id.into(),
            content: content.into(),
            language: None,
            variant: None,
        });
    }

    /// Re-scan the page and queue a fresh full content map.
    pub async fn rescan(&self) {
        let snapshot = {
            let mut doc = self.doc.lock().await;
            build_content_map(&mut doc, &self.config)
        };
        let _ = self.outbound.send(snapshot);
    }

    /// Tear the transport down. Idempotent, and safe even if the
    /// connection never came up.
    pub fn destroy(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TransportManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Scan the document and wrap the result as a `content-map` message.
fn build_content_map(doc: &mut Document, config: &TransportConfig) -> ClientMessage {
    let scanned = scanner::scan(doc);
    let content_map: BTreeMap<String, ContentMapEntry> = scanned
        .into_iter()
        .map(|(id, e)| {
            (
                id,
                ContentMapEntry {
                    selector: e.selector,
                    content: e.content,
                    element_type: e.element_type,
                },
            )
        })
        .collect();
    ClientMessage::ContentMap {
        site_id: config.site_id.clone(),
        url: config.page_url.clone(),
        content_map,
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

async fn run(
    doc: Arc<Mutex<Document>>,
    config: Arc<TransportConfig>,
    state_tx: watch::Sender<ConnectionState>,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientMessage>,
    cancel: CancellationToken,
) {
    let mut policy = ReconnectPolicy::new(config.max_reconnect_attempts);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        state_tx.send_replace(if policy.ever_connected {
            ConnectionState::Reconnecting
        } else {
            ConnectionState::Connecting
        });

        match tokio_tungstenite::connect_async(config.ws_url()).await {
            Ok((stream, _)) => {
                policy.connected();
                state_tx.send_replace(ConnectionState::Connected);
                tracing::info!(site_id = %config.site_id, "Transport connected");

                connected_loop(&doc, &config, stream, &mut outbound_rx, &cancel).await;

                if cancel.is_cancelled() {
                    break;
                }
                tracing::warn!(site_id = %config.site_id, "Transport connection lost");
            }
            Err(e) => {
                tracing::warn!(site_id = %config.site_id, error = %e, "Transport connect failed");
            }
        }

        match policy.on_failure() {
            ReconnectAction::Retry => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(config.reconnect_delay) => {}
                }
            }
            ReconnectAction::FallBack => {
                tracing::warn!(
                    site_id = %config.site_id,
                    "Primary transport unavailable; falling back to polling"
                );
                // Nothing drains the outbound queue in fallback; close it
                // so a page that keeps editing cannot grow it forever.
                outbound_rx.close();
                while outbound_rx.try_recv().is_ok() {}
                state_tx.send_replace(ConnectionState::PollingFallback);
                poll_loop(&doc, &config, &cancel).await;
                break;
            }
            ReconnectAction::GiveUp => {
                tracing::warn!(site_id = %config.site_id, "Reconnect attempts exhausted");
                state_tx.send_replace(ConnectionState::Disconnected);
                break;
            }
        }
    }

    state_tx.send_replace(ConnectionState::Disconnected);
}

/// Drive one live WebSocket connection until it drops or is cancelled.
async fn connected_loop<S>(
    doc: &Arc<Mutex<Document>>,
    config: &TransportConfig,
    stream: S,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
    cancel: &CancellationToken,
) where
    S: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut write, mut read) = stream.split();

    // Full snapshot on connect, never a diff.
    let mut mutations = {
        let mut doc = doc.lock().await;
        let snapshot = build_content_map(&mut doc, config);
        if let Ok(text) = serde_json::to_string(&snapshot) {
            if write.send(WsMessage::Text(text.into())).await.is_err() {
                return;
            }
        }
        doc.subscribe_mutations()
    };
    let _ = mutations.borrow_and_update();

    // Debounce deadline for mutation-triggered re-scans; reset on each
    // new burst.
    let mut rescan_deadline: Option<Instant> = None;
    let mut outbound_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.send(WsMessage::Close(None)).await;
                return;
            }

            inbound = read.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_inbound(doc, config, text.as_ref()).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "Transport receive error");
                        return;
                    }
                }
            }

            queued = outbound_rx.recv(), if outbound_open => {
                match queued {
                    Some(msg) => {
                        if let Ok(text) = serde_json::to_string(&msg) {
                            if write.send(WsMessage::Text(text.into())).await.is_err() {
                                return;
                            }
                        }
                    }
                    None => outbound_open = false,
                }
            }

            changed = mutations.changed() => {
                if changed.is_ok() {
                    rescan_deadline = Some(Instant::now() + config.rescan_debounce);
                } else {
                    // Document dropped; nothing left to watch.
                }
            }

            _ = async { tokio::time::sleep_until(rescan_deadline.unwrap_or_else(Instant::now)).await },
                if rescan_deadline.is_some() =>
            {
                rescan_deadline = None;
                let snapshot = {
                    let mut doc = doc.lock().await;
                    build_content_map(&mut doc, config)
                };
                if let Ok(text) = serde_json::to_string(&snapshot) {
                    if write.send(WsMessage::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                tracing::debug!(site_id = %config.site_id, "Re-scan after DOM mutations");
            }
        }
    }
}

/// Parse and apply one inbound hub message, with the transient visual
/// acknowledgment on updated elements.
async fn handle_inbound(doc: &Arc<Mutex<Document>>, config: &TransportConfig, text: &str) {
    let msg: ServerMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(error = %e, "Unrecognized hub message");
            return;
        }
    };

    let updated = {
        let mut doc = doc.lock().await;
        apply_server_message(&mut doc, &msg)
    };

    if let Some(node) = updated {
        let doc = Arc::clone(doc);
        let duration = config.highlight_duration;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            doc.lock().await.remove_class(node, HIGHLIGHT_CLASS);
        });
    }
}

/// Terminal polling fallback: fetch the site's content on a fixed
/// interval and apply it through the same inbound path.
async fn poll_loop(doc: &Arc<Mutex<Document>>, config: &TransportConfig, cancel: &CancellationToken) {
    let client = reqwest::Client::new();
    let url = config.poll_url();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(config.poll_interval) => {}
        }

        let response = match client.get(&url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!(status = %r.status(), "Polling request rejected");
                continue;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Polling request failed");
                continue;
            }
        };

        let items: Vec<PollItem> = match response.json().await {
            Ok(items) => items,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed polling response");
                continue;
            }
        };

        let mut doc = doc.lock().await;
        for item in items {
            apply_server_message(
                &mut doc,
                &ServerMessage::ContentUpdate {
                    element_id: item.element_id,
                    content: item.content,
                    language: String::new(),
                    variant: String::new(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use super::*;
    use assert_matches::assert_matches;
    use tokio_tungstenite::tungstenite::Error as WsError;

    /// Channel-backed stand-in for a WebSocket connection, so the
    /// connected loop can be driven without a server.
    struct FakeSocket {
        incoming: mpsc::UnboundedReceiver<Result<WsMessage, WsError>>,
        outgoing: mpsc::UnboundedSender<WsMessage>,
    }

    impl FakeSocket {
        fn pair() -> (
            Self,
            mpsc::UnboundedSender<Result<WsMessage, WsError>>,
            mpsc::UnboundedReceiver<WsMessage>,
        ) {
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            (
                Self {
                    incoming: in_rx,
                    outgoing: out_tx,
                },
                in_tx,
                out_rx,
            )
        }
    }

    impl futures::Stream for FakeSocket {
        type Item = Result<WsMessage, WsError>;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            self.incoming.poll_recv(cx)
        }
    }

    impl futures::Sink<WsMessage> for FakeSocket {
        type Error = WsError;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: WsMessage) -> Result<(), WsError> {
            self.outgoing.send(item).map_err(|_| WsError::ConnectionClosed)
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }
    }

    fn assert_content_map(msg: &WsMessage) {
        match msg {
            WsMessage::Text(text) => {
                let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                assert_eq!(value["type"], "content-map");
            }
            other => panic!("Expected Text frame, got: {other:?}"),
        }
    }

    async fn append_paragraph(doc: &Arc<Mutex<Document>>, text: &str) {
        let mut doc = doc.lock().await;
        let body = doc.body();
        let p = doc.create_element("p");
        let t = doc.create_text(text);
        doc.append_child(body, p);
        doc.append_child(p, t);
    }

    #[test]
    fn policy_retries_then_falls_back_when_never_connected() {
        let mut policy = ReconnectPolicy::new(3);
        assert_matches!(policy.on_failure(), ReconnectAction::Retry);
        assert_matches!(policy.on_failure(), ReconnectAction::Retry);
        assert_matches!(policy.on_failure(), ReconnectAction::Retry);
        assert_matches!(policy.on_failure(), ReconnectAction::FallBack);
    }

    #[test]
    fn policy_gives_up_after_a_working_connection_dropped() {
        let mut policy = ReconnectPolicy::new(2);
        policy.on_failure();
        policy.connected();
        assert_matches!(policy.on_failure(), ReconnectAction::Retry);
        assert_matches!(policy.on_failure(), ReconnectAction::Retry);
        assert_matches!(policy.on_failure(), ReconnectAction::GiveUp);
    }

    #[test]
    fn apply_update_writes_text_and_highlight() {
        let mut doc = Document::new();
        let h1 = doc.create_element("h1");
        doc.set_attribute(h1, ID_ATTR, "h1-1");
        let t = doc.create_text("Hello");
        doc.append_child(doc.body(), h1);
        doc.append_child(h1, t);

        let node = apply_server_message(
            &mut doc,
            &ServerMessage::ContentUpdate {
                element_id: "h1-1".into(),
                content: "Bye".into(),
                language: "en".into(),
                variant: "default".into(),
            },
        );

        assert_eq!(node, Some(h1));
        assert_eq!(doc.text_content(h1), "Bye");
        assert!(doc.classes(h1).iter().any(|c| c == HIGHLIGHT_CLASS));
    }

    #[test]
    fn apply_update_uses_value_for_inputs() {
        let mut doc = Document::new();
        let input = doc.create_element("input");
        doc.set_attribute(input, ID_ATTR, "in-1");
        doc.set_attribute(input, "value", "Old");
        doc.append_child(doc.body(), input);

        apply_server_message(
            &mut doc,
            &ServerMessage::ContentUpdate {
                element_id: "in-1".into(),
                content: "New".into(),
                language: "en".into(),
                variant: "default".into(),
            },
        );

        assert_eq!(doc.value(input), "New");
    }

    #[test]
    fn unknown_element_ids_are_ignored() {
        let mut doc = Document::new();
        let node = apply_server_message(
            &mut doc,
            &ServerMessage::ContentUpdate {
                element_id: "missing".into(),
                content: "Bye".into(),
                language: "en".into(),
                variant: "default".into(),
            },
        );
        assert!(node.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_bursts_coalesce_into_one_rescan() {
        let doc = Arc::new(Mutex::new(Document::new()));
        append_paragraph(&doc, "Initial copy").await;

        let config = TransportConfig::new("http://127.0.0.1:1", "s1", "https://example.com/");
        let (socket, _in_tx, mut out_rx) = FakeSocket::pair();
        let (_outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let loop_fut = connected_loop(&doc, &config, socket, &mut outbound_rx, &cancel);
        let driver = async {
            let snapshot = out_rx.recv().await.unwrap();
            assert_content_map(&snapshot);

            // Two mutations 100ms apart land in one debounce window.
            append_paragraph(&doc, "First edit").await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            append_paragraph(&doc, "Second edit").await;

            // The window restarts at the second mutation, so 450ms later
            // (past the first mutation's 500ms, short of the second's)
            // nothing has been sent yet.
            tokio::time::sleep(Duration::from_millis(450)).await;
            assert!(out_rx.try_recv().is_err(), "re-scan fired inside the quiet window");

            tokio::time::sleep(Duration::from_millis(100)).await;
            let rescan = out_rx.recv().await.unwrap();
            assert_content_map(&rescan);

            // One frame for the whole burst, not one per mutation.
            tokio::time::sleep(Duration::from_secs(2)).await;
            assert!(out_rx.try_recv().is_err(), "burst produced more than one re-scan");

            cancel.cancel();
        };
        tokio::join!(loop_fut, driver);
    }

    #[tokio::test]
    async fn never_connected_transport_falls_back_to_polling() {
        let doc = Arc::new(Mutex::new(Document::new()));
        // Port 1 refuses immediately; zero-attempt budget falls back at
        // once. The long poll interval keeps the fallback quiet.
        let mut config = TransportConfig::new("http://127.0.0.1:1", "s1", "https://example.com/");
        config.max_reconnect_attempts = 0;
        config.poll_interval = Duration::from_secs(3600);

        let manager = TransportManager::start(doc, config);
        let reached = tokio::time::timeout(Duration::from_secs(5), async {
            while manager.state() != ConnectionState::PollingFallback {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(reached.is_ok(), "expected PollingFallback, got {:?}", manager.state());
        // Nothing drains the queue in fallback; the channel is closed so
        // further edits are dropped instead of piling up.
        assert!(manager.outbound.is_closed());

        manager.destroy();
    }

    #[tokio::test]
    async fn manager_entry_points_are_safe_while_disconnected() {
        let doc = Arc::new(Mutex::new(Document::new()));
        let mut config = TransportConfig::new("http://127.0.0.1:1", "s1", "https://example.com/");
        config.max_reconnect_attempts = 0;

        let manager = TransportManager::start(Arc::clone(&doc), config);
        manager.update("h1-1", "Bye");
        manager.rescan().await;
        manager.destroy();
        manager.destroy();
    }

    #[test]
    fn ws_url_swaps_scheme_and_carries_site() {
        let config = TransportConfig::new("https://hub.example.com", "s1", "https://example.com/");
        assert_eq!(config.ws_url(), "wss://hub.example.com/api/v1/ws?site_id=s1");
    }
}
