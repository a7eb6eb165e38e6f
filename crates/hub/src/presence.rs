//! Ephemeral presence tracking for dashboard collaborators.
//!
//! One record per dashboard connection, keyed by connection id and scoped
//! to a site. Nothing here is persisted: a disconnect drops the record
//! (and the hub broadcasts the departure). There is no TTL; clients
//! refresh `last_activity` on every update so dashboards can gray out
//! idle collaborators themselves.

use std::collections::HashMap;

use livetext_core::presence::PresenceRecord;
use tokio::sync::RwLock;

/// In-memory presence registry, thread-safe via interior `RwLock`.
pub struct PresenceTracker {
    records: RwLock<HashMap<String, (String, PresenceRecord)>>,
}

impl PresenceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Overwrite the presence record for a connection.
    pub async fn update(&self, conn_id: &str, site_id: &str, record: PresenceRecord) {
        self.records
            .write()
            .await
            .insert(conn_id.to_string(), (site_id.to_string(), record));
    }

    /// Drop a connection's record, returning it for the departure
    /// broadcast.
    pub async fn remove(&self, conn_id: &str) -> Option<(String, PresenceRecord)> {
        self.records.write().await.remove(conn_id)
    }

    /// All current records for a site, in no particular order.
    pub async fn list_for_site(&self, site_id: &str) -> Vec<PresenceRecord> {
        self.records
            .read()
            .await
            .values()
            .filter(|(site, _)| site == site_id)
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Number of tracked records across all sites.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the tracker holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
