//! Content element model and DTOs.

use livetext_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `content_elements` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContentElement {
    pub id: DbId,
    pub site_id: String,
    pub element_id: String,
    pub language: String,
    pub variant: String,
    pub selector: String,
    pub original_content: String,
    pub current_content: String,
    pub element_type: String,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Upsert input for one content-map entry.
#[derive(Debug, Clone)]
pub struct ContentUpsert<'a> {
    pub site_id: &'a str,
    pub element_id: &'a str,
    pub language: &'a str,
    pub variant: &'a str,
    pub selector: &'a str,
    pub content: &'a str,
    pub element_type: &'a str,
}
