//! PageStore Trait
//!
//! Persistence boundary between [`PageService`](crate::services::PageService)
//! and a storage backend. Two implementations exist:
//!
//! - [`LibsqlStore`](super::LibsqlStore): the local libsql database
//! - [`MemoryStore`](super::MemoryStore): process memory, for tests and
//!   throwaway sessions
//!
//! Methods take ownership where the store keeps the value. Lookups return
//! `Ok(None)` for a missing row; `Err` is reserved for backend failures.

use crate::hierarchy::{MoveRequest, PlanError, ReorderPlan};
use crate::models::{Image, ImageUpdate, Page, PageSummary, PageUpdate, Settings};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PageStore: Send + Sync {
    /// Insert a fully-populated page
    async fn create_page(&self, page: Page) -> Result<Page>;

    async fn get_page(&self, id: &str) -> Result<Option<Page>>;

    /// Every page, ascending sibling order
    async fn list_pages(&self) -> Result<Vec<Page>>;

    /// Direct children of a page, ascending sibling order
    async fn list_children(&self, parent_id: &str) -> Result<Vec<PageSummary>>;

    /// Apply a partial update; `Ok(None)` when the page does not exist
    async fn update_page(&self, id: &str, update: PageUpdate) -> Result<Option<Page>>;

    /// Delete a page and its images; `Ok(false)` when it did not exist
    async fn delete_page(&self, id: &str) -> Result<bool>;

    /// Plan and apply a move atomically against the current sibling orders
    ///
    /// The inner `Err` is a rejected move; nothing was written.
    async fn move_page(&self, request: &MoveRequest) -> Result<std::result::Result<ReorderPlan, PlanError>>;

    /// Pages matching `fts_query`, title hits on `term` first, then most
    /// recently updated
    async fn search_pages(&self, fts_query: &str, term: &str, limit: usize) -> Result<Vec<Page>>;

    /// Rebuild the full-text index from stored pages
    async fn rebuild_search_index(&self) -> Result<()>;

    async fn create_image(&self, image: Image) -> Result<Image>;

    async fn get_image(&self, id: &str) -> Result<Option<Image>>;

    /// Images newest first, optionally restricted to one page
    async fn list_images(&self, page_id: Option<&str>) -> Result<Vec<Image>>;

    async fn update_image(&self, id: &str, update: ImageUpdate) -> Result<Option<Image>>;

    async fn delete_image(&self, id: &str) -> Result<bool>;

    async fn get_settings(&self) -> Result<Option<Settings>>;

    async fn save_settings(&self, settings: Settings) -> Result<Settings>;
}
