//! Inbound WebSocket message routing.
//!
//! Each connection's messages are dispatched here to completion, in
//! arrival order, including any persistence round-trip; the fan-out step
//! itself is a synchronous enqueue onto each recipient's send channel.
//!
//! Storage is optional: without a pool the hub runs in degraded mode where
//! routing and broadcasting proceed unchanged, persistence is skipped, and
//! the skip is surfaced only via logs and acknowledgment metadata.
//!
//! Note on `content-update`: the hub does not re-validate the sender's
//! editing session token before applying the write. Exclusivity is
//! advisory, checked at session start; a session can expire between grant
//! and submission and the write still lands. That window is an accepted
//! trade-off inherited from the session design, not a bug.

use std::sync::Arc;

use livetext_core::protocol::{BulkUpdateItem, ClientMessage, ContentMapEntry, ServerMessage};
use livetext_db::models::content::ContentUpsert;
use livetext_db::repositories::ContentRepo;
use livetext_db::DbPool;

use crate::presence::PresenceTracker;
use crate::ws::RoomRegistry;

/// Language assumed for entries that do not carry one.
const DEFAULT_LANGUAGE: &str = "en";
/// Variant assumed for entries that do not carry one.
const DEFAULT_VARIANT: &str = "default";

/// Routes inbound client messages to persistence and the right rooms.
pub struct Hub {
    registry: Arc<RoomRegistry>,
    presence: Arc<PresenceTracker>,
    pool: Option<DbPool>,
}

impl Hub {
    pub fn new(
        registry: Arc<RoomRegistry>,
        presence: Arc<PresenceTracker>,
        pool: Option<DbPool>,
    ) -> Self {
        Self {
            registry,
            presence,
            pool,
        }
    }

    /// Dispatch one inbound message from a connection.
    pub async fn dispatch(&self, conn_id: &str, msg: ClientMessage) {
        match msg {
            ClientMessage::ContentMap {
                site_id,
                url,
                content_map,
            } => self.handle_content_map(conn_id, site_id, url, content_map).await,
            ClientMessage::ContentUpdate {
                site_id,
                element_id,
                content,
                language,
                variant,
            } => {
                self.handle_content_update(
                    conn_id, &site_id, &element_id, &content, language, variant,
                )
                .await
            }
            ClientMessage::JoinDashboard { site_id, user_id } => {
                self.handle_join_dashboard(conn_id, &site_id, user_id).await
            }
            ClientMessage::BulkUpdate { updates } => {
                self.handle_bulk_update(conn_id, updates).await
            }
            ClientMessage::StartEditing {
                site_id,
                element_id,
                ..
            } => {
                let user_id = self.registry.user_of(conn_id).await;
                self.registry
                    .broadcast_to_dashboards(
                        &site_id,
                        &ServerMessage::EditingStarted { element_id, user_id },
                        Some(conn_id),
                    )
                    .await;
            }
            ClientMessage::EndEditing {
                site_id,
                element_id,
                ..
            } => {
                let user_id = self.registry.user_of(conn_id).await;
                self.registry
                    .broadcast_to_dashboards(
                        &site_id,
                        &ServerMessage::EditingEnded { element_id, user_id },
                        Some(conn_id),
                    )
                    .await;
            }
            ClientMessage::UpdatePresence { presence } => {
                self.handle_update_presence(conn_id, presence).await
            }
        }
    }

    /// Disconnect cleanup: leave rooms, drop presence, and notify the
    /// site's dashboards of the departure.
    pub async fn handle_disconnect(&self, conn_id: &str) {
        let removed = self.registry.remove(conn_id).await;

        if let Some((site_id, record)) = self.presence.remove(conn_id).await {
            self.registry
                .broadcast_to_dashboards(
                    &site_id,
                    &ServerMessage::PresenceLeft {
                        user_id: record.user_id,
                    },
                    None,
                )
                .await;
        }

        if let Some(removed) = removed {
            tracing::debug!(
                conn_id = %conn_id,
                site_id = %removed.site_id,
                dashboard = removed.dashboard,
                "Connection removed from rooms"
            );
        }
    }

    // -----------------------------------------------------------------
    // content-map
    // -----------------------------------------------------------------

    /// An embedded page synced its full content snapshot. Persist every
    /// entry, then summarize to the site's dashboards; the snapshot is
    /// never echoed back to the sending page.
    async fn handle_content_map(
        &self,
        conn_id: &str,
        site_id: String,
        url: String,
        content_map: std::collections::BTreeMap<String, ContentMapEntry>,
    ) {
        let element_count = content_map.len();

        match &self.pool {
            Some(pool) => {
                for (element_id, entry) in &content_map {
                    let upsert = ContentUpsert {
                        site_id: &site_id,
                        element_id,
                        language: DEFAULT_LANGUAGE,
                        variant: DEFAULT_VARIANT,
                        selector: &entry.selector,
                        content: &entry.content,
                        element_type: &entry.element_type,
                    };
                    if let Err(e) = ContentRepo::upsert(pool, &upsert).await {
                        tracing::error!(
                            site_id = %site_id,
                            element_id = %element_id,
                            error = %e,
                            "Failed to persist content-map entry"
                        );
                    }
                }
            }
            None => {
                tracing::warn!(
                    site_id = %site_id,
                    element_count,
                    "Storage unconfigured; content map not persisted"
                );
            }
        }

        self.registry
            .broadcast_to_dashboards(
                &site_id,
                &ServerMessage::ContentMapUpdated {
                    site_id: site_id.clone(),
                    url,
                    element_count,
                },
                Some(conn_id),
            )
            .await;

        tracing::info!(site_id = %site_id, element_count, "Content map synced");
    }

    // -----------------------------------------------------------------
    // content-update
    // -----------------------------------------------------------------

    /// A dashboard edited one element: persist, push the new content to
    /// the site room (minus the sender), and notify the other dashboards
    /// with attribution.
    async fn handle_content_update(
        &self,
        conn_id: &str,
        site_id: &str,
        element_id: &str,
        content: &str,
        language: Option<String>,
        variant: Option<String>,
    ) {
        let language = language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        let variant = variant.unwrap_or_else(|| DEFAULT_VARIANT.to_string());

        if let Err(error) = self
            .persist_update(site_id, element_id, &language, &variant, content)
            .await
        {
            // Degrades to non-durable sync; routing continues below.
            tracing::error!(
                site_id = %site_id,
                element_id = %element_id,
                error = %error,
                "Failed to persist content update"
            );
        }

        self.registry
            .broadcast_to_site(
                site_id,
                &ServerMessage::ContentUpdate {
                    element_id: element_id.to_string(),
                    content: content.to_string(),
                    language,
                    variant,
                },
                Some(conn_id),
            )
            .await;

        let updated_by = self.registry.user_of(conn_id).await;
        self.registry
            .broadcast_to_dashboards(
                site_id,
                &ServerMessage::ContentUpdated {
                    element_id: element_id.to_string(),
                    content: content.to_string(),
                    updated_by,
                    timestamp: chrono::Utc::now(),
                },
                Some(conn_id),
            )
            .await;
    }

    // -----------------------------------------------------------------
    // join-dashboard
    // -----------------------------------------------------------------

    async fn handle_join_dashboard(
        &self,
        conn_id: &str,
        site_id: &str,
        user_id: Option<livetext_core::types::DbId>,
    ) {
        // The room is derived from the handshake site, not the payload;
        // a mismatch is a client bug worth surfacing.
        if let Some(conn_site) = self.registry.site_of(conn_id).await {
            if conn_site != site_id {
                tracing::warn!(
                    conn_id = %conn_id,
                    handshake_site = %conn_site,
                    requested_site = %site_id,
                    "join-dashboard site mismatch; using handshake site"
                );
            }
        }

        if self.registry.join_dashboard(conn_id, user_id).await {
            tracing::info!(conn_id = %conn_id, site_id = %site_id, "Dashboard joined");
        }
    }

    // -----------------------------------------------------------------
    // bulk-update
    // -----------------------------------------------------------------

    /// Apply several dashboard edits in request order, each with the same
    /// persistence + broadcast as a single `content-update`, then report
    /// one aggregate acknowledgment to the sender.
    async fn handle_bulk_update(&self, conn_id: &str, updates: Vec<BulkUpdateItem>) {
        let Some(site_id) = self.registry.site_of(conn_id).await else {
            return;
        };

        if updates.is_empty() {
            self.registry
                .send_to(
                    conn_id,
                    &ServerMessage::BulkUpdateError {
                        error: "No updates provided".to_string(),
                    },
                )
                .await;
            return;
        }

        let mut applied = 0;
        let mut failed = 0;

        for item in &updates {
            match self
                .persist_update(
                    &site_id,
                    &item.element_id,
                    DEFAULT_LANGUAGE,
                    DEFAULT_VARIANT,
                    &item.content,
                )
                .await
            {
                Ok(()) => applied += 1,
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        site_id = %site_id,
                        element_id = %item.element_id,
                        error = %e,
                        "Bulk update item failed to persist"
                    );
                }
            }

            self.registry
                .broadcast_to_site(
                    &site_id,
                    &ServerMessage::ContentUpdate {
                        element_id: item.element_id.clone(),
                        content: item.content.clone(),
                        language: DEFAULT_LANGUAGE.to_string(),
                        variant: DEFAULT_VARIANT.to_string(),
                    },
                    Some(conn_id),
                )
                .await;
        }

        let updated_by = self.registry.user_of(conn_id).await;
        for item in &updates {
            self.registry
                .broadcast_to_dashboards(
                    &site_id,
                    &ServerMessage::ContentUpdated {
                        element_id: item.element_id.clone(),
                        content: item.content.clone(),
                        updated_by,
                        timestamp: chrono::Utc::now(),
                    },
                    Some(conn_id),
                )
                .await;
        }

        self.registry
            .send_to(
                conn_id,
                &ServerMessage::BulkUpdateAck {
                    applied,
                    failed,
                    persisted: self.pool.is_some(),
                },
            )
            .await;
    }

    // -----------------------------------------------------------------
    // update-presence
    // -----------------------------------------------------------------

    async fn handle_update_presence(
        &self,
        conn_id: &str,
        presence: livetext_core::presence::PresenceRecord,
    ) {
        let Some(site_id) = self.registry.site_of(conn_id).await else {
            return;
        };

        self.presence.update(conn_id, &site_id, presence.clone()).await;

        self.registry
            .broadcast_to_dashboards(
                &site_id,
                &ServerMessage::PresenceUpdate { presence },
                Some(conn_id),
            )
            .await;
    }

    // -----------------------------------------------------------------
    // Persistence helper
    // -----------------------------------------------------------------

    /// Write an accepted edit to storage. In degraded mode this is a
    /// logged no-op; the caller broadcasts regardless.
    async fn persist_update(
        &self,
        site_id: &str,
        element_id: &str,
        language: &str,
        variant: &str,
        content: &str,
    ) -> Result<(), sqlx::Error> {
        let Some(pool) = &self.pool else {
            tracing::debug!(
                site_id = %site_id,
                element_id = %element_id,
                "Storage unconfigured; update not persisted"
            );
            return Ok(());
        };

        let found =
            ContentRepo::update_content(pool, site_id, element_id, language, variant, content)
                .await?;
        if !found {
            // The element may belong to a page of this site the hub has
            // not seen yet; broadcasting still makes sense.
            tracing::debug!(
                site_id = %site_id,
                element_id = %element_id,
                "Update for unknown element; nothing persisted"
            );
        }
        Ok(())
    }
}
