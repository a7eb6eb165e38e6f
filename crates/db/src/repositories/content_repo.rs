//! Repository for the `content_elements` table.

use sqlx::PgPool;

use crate::models::content::{ContentElement, ContentUpsert};

/// Column list for `content_elements` queries.
const CONTENT_COLUMNS: &str = "id, site_id, element_id, language, variant, selector, \
                               original_content, current_content, element_type, metadata, \
                               created_at, updated_at";

/// Provides CRUD operations for discovered content elements.
pub struct ContentRepo;

impl ContentRepo {
    /// Upsert one content-map entry, keyed by
    /// `(site_id, element_id, language, variant)`.
    ///
    /// On first sight the content becomes both `original_content` and
    /// `current_content`; on re-scan only the selector, current content,
    /// and type hint are refreshed (the original is preserved for diffing).
    pub async fn upsert(
        pool: &PgPool,
        entry: &ContentUpsert<'_>,
    ) -> Result<ContentElement, sqlx::Error> {
        let query = format!(
            "INSERT INTO content_elements \
                 (site_id, element_id, language, variant, selector, \
                  original_content, current_content, element_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $6, $7) \
             ON CONFLICT (site_id, element_id, language, variant) \
             DO UPDATE SET selector = EXCLUDED.selector, \
                           current_content = EXCLUDED.current_content, \
                           element_type = EXCLUDED.element_type, \
                           updated_at = NOW() \
             RETURNING {CONTENT_COLUMNS}"
        );
        sqlx::query_as::<_, ContentElement>(&query)
            .bind(entry.site_id)
            .bind(entry.element_id)
            .bind(entry.language)
            .bind(entry.variant)
            .bind(entry.selector)
            .bind(entry.content)
            .bind(entry.element_type)
            .fetch_one(pool)
            .await
    }

    /// Write an accepted edit into `current_content`.
    ///
    /// Returns `false` if no matching element exists (the hub still
    /// broadcasts; the page may sync the element later).
    pub async fn update_content(
        pool: &PgPool,
        site_id: &str,
        element_id: &str,
        language: &str,
        variant: &str,
        content: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE content_elements SET current_content = $5, updated_at = NOW() \
             WHERE site_id = $1 AND element_id = $2 AND language = $3 AND variant = $4",
        )
        .bind(site_id)
        .bind(element_id)
        .bind(language)
        .bind(variant)
        .bind(content)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All elements of a site, for the polling fallback endpoint.
    pub async fn list_for_site(
        pool: &PgPool,
        site_id: &str,
    ) -> Result<Vec<ContentElement>, sqlx::Error> {
        let query = format!(
            "SELECT {CONTENT_COLUMNS} FROM content_elements \
             WHERE site_id = $1 ORDER BY element_id, language, variant"
        );
        sqlx::query_as::<_, ContentElement>(&query)
            .bind(site_id)
            .fetch_all(pool)
            .await
    }

    /// Look up one element by its page-scoped id (any language/variant).
    pub async fn get_by_element_id(
        pool: &PgPool,
        element_id: &str,
    ) -> Result<Option<ContentElement>, sqlx::Error> {
        let query = format!(
            "SELECT {CONTENT_COLUMNS} FROM content_elements \
             WHERE element_id = $1 ORDER BY id LIMIT 1"
        );
        sqlx::query_as::<_, ContentElement>(&query)
            .bind(element_id)
            .fetch_optional(pool)
            .await
    }

    /// Count of elements stored for a site.
    pub async fn count_for_site(pool: &PgPool, site_id: &str) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM content_elements WHERE site_id = $1")
                .bind(site_id)
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }

    /// Resolve the owning site of an element, used by the session manager.
    pub async fn site_for_element(
        pool: &PgPool,
        element_id: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT site_id FROM content_elements WHERE element_id = $1 ORDER BY id LIMIT 1",
        )
        .bind(element_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(site_id,)| site_id))
    }
}
