//! LibsqlStore - PageStore over the local libsql database
//!
//! A thin wrapper around [`DatabaseService`]: SQL lives there, this module
//! converts rows into models and attaches context to failures.

use crate::db::page_store::PageStore;
use crate::db::{DatabaseService, DbCreatePageParams};
use crate::hierarchy::{MoveRequest, PlanError, ReorderPlan};
use crate::models::{
    self, parse_tags, AiEngineKind, Image, ImageUpdate, Page, PageSummary, PageUpdate,
    Settings,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::Row;
use std::sync::Arc;

pub struct LibsqlStore {
    db: Arc<DatabaseService>,
}

impl LibsqlStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// Stored timestamps are RFC3339; rows written by the sqlite shell use
    /// `CURRENT_TIMESTAMP` ("YYYY-MM-DD HH:MM:SS")
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        Err(anyhow::anyhow!(
            "Unable to parse timestamp '{}' as RFC3339 or SQLite format",
            s
        ))
    }

    /// Columns in `PAGE_COLUMNS` order
    fn row_to_page(row: &Row) -> Result<Page> {
        let tags: String = row.get(6).context("Failed to get tags")?;
        let created_at: String = row.get(8).context("Failed to get created_at")?;
        let updated_at: String = row.get(9).context("Failed to get updated_at")?;

        Ok(Page {
            id: row.get(0).context("Failed to get id")?,
            title: row.get(1).context("Failed to get title")?,
            content: row.get(2).context("Failed to get content")?,
            parent_id: row.get(3).context("Failed to get parent_id")?,
            order: row.get(4).context("Failed to get sort_order")?,
            is_favorite: row.get::<i64>(5).context("Failed to get is_favorite")? != 0,
            tags: parse_tags(&tags),
            searchable_text: row.get(7).context("Failed to get searchable_text")?,
            created_at: Self::parse_timestamp(&created_at)?,
            updated_at: Self::parse_timestamp(&updated_at)?,
        })
    }

    /// Columns in `IMAGE_COLUMNS` order
    fn row_to_image(row: &Row) -> Result<Image> {
        let created_at: String = row.get(6).context("Failed to get created_at")?;
        let updated_at: String = row.get(7).context("Failed to get updated_at")?;

        Ok(Image {
            id: row.get(0).context("Failed to get id")?,
            filename: row.get(1).context("Failed to get filename")?,
            original_name: row.get(2).context("Failed to get original_name")?,
            mime_type: row.get(3).context("Failed to get mime_type")?,
            size: row.get(4).context("Failed to get size")?,
            page_id: row.get(5).context("Failed to get page_id")?,
            created_at: Self::parse_timestamp(&created_at)?,
            updated_at: Self::parse_timestamp(&updated_at)?,
        })
    }

    fn row_to_settings(row: &Row) -> Result<Settings> {
        let engine: String = row.get(1).context("Failed to get ai_engine")?;
        let created_at: String = row.get(6).context("Failed to get created_at")?;
        let updated_at: String = row.get(7).context("Failed to get updated_at")?;

        // Unknown engine names fall back to the default rather than hiding
        // the whole settings row.
        let ai_engine = engine.parse::<AiEngineKind>().unwrap_or_else(|e| {
            tracing::warn!("{}; using {}", e, AiEngineKind::default());
            AiEngineKind::default()
        });

        Ok(Settings {
            id: row.get(0).context("Failed to get id")?,
            ai_engine,
            lm_studio_url: row.get(2).context("Failed to get lm_studio_url")?,
            lm_studio_model: row.get(3).context("Failed to get lm_studio_model")?,
            preferred_model: row.get(4).context("Failed to get preferred_model")?,
            fallback_enabled: row.get::<i64>(5).context("Failed to get fallback_enabled")? != 0,
            created_at: Self::parse_timestamp(&created_at)?,
            updated_at: Self::parse_timestamp(&updated_at)?,
        })
    }

    async fn collect<T>(mut rows: libsql::Rows, convert: fn(&Row) -> Result<T>) -> Result<Vec<T>> {
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.context("Failed to read row")? {
            out.push(convert(&row)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl PageStore for LibsqlStore {
    async fn create_page(&self, page: Page) -> Result<Page> {
        self.db
            .db_create_page(DbCreatePageParams {
                id: &page.id,
                title: &page.title,
                content: &page.content,
                parent_id: page.parent_id.as_deref(),
                order: page.order,
                is_favorite: page.is_favorite,
                tags: &page.tags,
                searchable_text: page.searchable_text.as_deref(),
                created_at: &page.created_at,
                updated_at: &page.updated_at,
            })
            .await
            .with_context(|| format!("Failed to insert page {}", page.id))?;
        Ok(page)
    }

    async fn get_page(&self, id: &str) -> Result<Option<Page>> {
        match self.db.db_get_page(id).await? {
            Some(row) => Ok(Some(Self::row_to_page(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_pages(&self) -> Result<Vec<Page>> {
        let rows = self.db.db_list_pages().await?;
        Self::collect(rows, Self::row_to_page).await
    }

    async fn list_children(&self, parent_id: &str) -> Result<Vec<PageSummary>> {
        let rows = self.db.db_get_children(parent_id).await?;
        let pages = Self::collect(rows, Self::row_to_page).await?;
        Ok(pages.into_iter().map(PageSummary::from).collect())
    }

    async fn update_page(&self, id: &str, update: PageUpdate) -> Result<Option<Page>> {
        let affected = self
            .db
            .db_update_page(id, &update, &models::now())
            .await
            .with_context(|| format!("Failed to update page {}", id))?;
        if affected == 0 {
            return Ok(None);
        }
        self.get_page(id).await
    }

    async fn delete_page(&self, id: &str) -> Result<bool> {
        let affected = self
            .db
            .db_delete_page(id)
            .await
            .with_context(|| format!("Failed to delete page {}", id))?;
        Ok(affected > 0)
    }

    async fn move_page(
        &self,
        request: &MoveRequest,
    ) -> Result<std::result::Result<ReorderPlan, PlanError>> {
        self.db
            .db_move_page(request, &models::now())
            .await
            .with_context(|| format!("Failed to move page {}", request.page_id))
    }

    async fn search_pages(&self, fts_query: &str, term: &str, limit: usize) -> Result<Vec<Page>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self.db.db_search_pages(fts_query, term, limit).await?;
        Self::collect(rows, Self::row_to_page).await
    }

    async fn rebuild_search_index(&self) -> Result<()> {
        self.db.db_rebuild_search_index().await?;
        Ok(())
    }

    async fn create_image(&self, image: Image) -> Result<Image> {
        self.db
            .db_save_image(&image)
            .await
            .with_context(|| format!("Failed to insert image {}", image.id))?;
        Ok(image)
    }

    async fn get_image(&self, id: &str) -> Result<Option<Image>> {
        match self.db.db_get_image(id).await? {
            Some(row) => Ok(Some(Self::row_to_image(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_images(&self, page_id: Option<&str>) -> Result<Vec<Image>> {
        let rows = self.db.db_list_images(page_id).await?;
        Self::collect(rows, Self::row_to_image).await
    }

    async fn update_image(&self, id: &str, update: ImageUpdate) -> Result<Option<Image>> {
        let Some(mut image) = self.get_image(id).await? else {
            return Ok(None);
        };
        update.apply_to(&mut image);
        image.updated_at = models::now();
        self.db
            .db_save_image(&image)
            .await
            .with_context(|| format!("Failed to update image {}", id))?;
        Ok(Some(image))
    }

    async fn delete_image(&self, id: &str) -> Result<bool> {
        let affected = self.db.db_delete_image(id).await?;
        Ok(affected > 0)
    }

    async fn get_settings(&self) -> Result<Option<Settings>> {
        match self.db.db_get_settings(crate::models::SETTINGS_ID).await? {
            Some(row) => Ok(Some(Self::row_to_settings(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_settings(&self, settings: Settings) -> Result<Settings> {
        self.db
            .db_upsert_settings(&settings)
            .await
            .context("Failed to save settings")?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = LibsqlStore::parse_timestamp("2024-03-01T10:20:30.123Z").unwrap();
        assert_eq!(rfc.timestamp_subsec_millis(), 123);

        let sqlite = LibsqlStore::parse_timestamp("2024-03-01 10:20:30").unwrap();
        assert_eq!(sqlite.timestamp(), rfc.timestamp());

        assert!(LibsqlStore::parse_timestamp("yesterday").is_err());
    }
}
