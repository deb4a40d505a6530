//! Page Service
//!
//! Business rules on top of a [`PageStore`]:
//!
//! - page CRUD with defaults and searchable-text upkeep
//! - the sidebar tree, breadcrumbs and drag-and-drop moves
//! - full-text search query preparation
//! - image metadata and the global settings record
//!
//! The HTTP layer and the assistant both go through this type; neither
//! talks to a store directly.

use crate::db::{DatabaseService, LibsqlStore, MemoryStore, PageStore};
use crate::hierarchy::{self, DropPosition, MoveRequest, PageNode};
use crate::models::{
    self, CreateImage, CreatePage, Document, Image, ImageUpdate, ImageWithPage, Page,
    PageSummary, PageUpdate, PageWithRelations, Settings, SettingsUpdate, DEFAULT_PAGE_TITLE,
};
use crate::services::error::PageServiceError;
use crate::text::{extract_searchable_text, search_snippet, searchable_text_for, IndexMode};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Maximum number of search results
pub const SEARCH_LIMIT: usize = 50;

/// Characters removed from a search query before it reaches FTS5
const QUERY_QUOTES: [char; 3] = ['"', '\'', '\u{2019}'];

/// A prepared full-text query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Expression passed to `MATCH`
    pub fts: String,
    /// Bare term used for title ranking
    pub term: String,
}

impl SearchQuery {
    /// `None` when nothing searchable is left after trimming and quote
    /// stripping
    ///
    /// The term always becomes one quoted phrase, so FTS5 operators and
    /// punctuation (`NOT`, `-`, `+`, `*`) are matched as text.
    pub fn prepare(raw: &str) -> Option<Self> {
        let term: String = raw.trim().chars().filter(|c| !QUERY_QUOTES.contains(c)).collect();
        let term = term.trim().to_string();
        if term.is_empty() {
            return None;
        }

        Some(Self {
            fts: format!("\"{}\"", term),
            term,
        })
    }
}

/// One search result with the excerpt shown under its title
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub page: Page,
    /// Plain text around the first hit, query wrapped in `<mark>`
    pub snippet: String,
}

#[derive(Clone)]
pub struct PageService {
    store: Arc<dyn PageStore>,
}

impl PageService {
    pub fn new(store: Arc<dyn PageStore>) -> Self {
        Self { store }
    }

    /// Service over the libsql database at `db_path`
    pub async fn open(db_path: PathBuf) -> Result<Self, PageServiceError> {
        let db = DatabaseService::new(db_path).await?;
        Ok(Self::new(Arc::new(LibsqlStore::new(Arc::new(db)))))
    }

    /// Service over a fresh [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn PageStore> {
        &self.store
    }

    //
    // PAGES
    //

    /// Create a page; missing fields get defaults
    ///
    /// Title "Untitled Page", one empty paragraph, order 0, no tags. The
    /// searchable text is derived from title and content unless supplied.
    pub async fn create_page(&self, input: CreatePage) -> Result<Page, PageServiceError> {
        let now = models::now();
        let title = input.title.unwrap_or_else(|| DEFAULT_PAGE_TITLE.to_string());
        let content = input
            .content
            .unwrap_or_else(|| Document::new_page().to_json());
        let searchable_text = input
            .searchable_text
            .unwrap_or_else(|| searchable_text_for(&title, &content));

        let page = Page {
            id: Uuid::new_v4().to_string(),
            title,
            content,
            parent_id: input.parent_id,
            order: input.order.unwrap_or(0),
            is_favorite: input.is_favorite.unwrap_or(false),
            tags: input.tags.unwrap_or_default(),
            searchable_text: Some(searchable_text),
            created_at: now,
            updated_at: now,
        };

        let page = self.store.create_page(page).await?;
        tracing::debug!("Created page {} ({})", page.id, page.title);
        Ok(page)
    }

    /// New "Untitled Page" under `parent_id`, ordered just after the parent
    pub async fn create_subpage(&self, parent_id: &str) -> Result<Page, PageServiceError> {
        let parent = self.require_page(parent_id).await?;
        self.create_page(CreatePage::titled(DEFAULT_PAGE_TITLE).under(&parent.id).at(parent.order + 1))
            .await
    }

    async fn require_page(&self, id: &str) -> Result<Page, PageServiceError> {
        self.store
            .get_page(id)
            .await?
            .ok_or_else(|| PageServiceError::page_not_found(id))
    }

    /// Page with its images and direct children
    pub async fn get_page(&self, id: &str) -> Result<PageWithRelations, PageServiceError> {
        let page = self.require_page(id).await?;
        let images = self.store.list_images(Some(id)).await?;
        let children = self.store.list_children(id).await?;
        Ok(PageWithRelations {
            page,
            images,
            children,
        })
    }

    /// Every page in ascending sibling order
    pub async fn list_pages(&self) -> Result<Vec<Page>, PageServiceError> {
        Ok(self.store.list_pages().await?)
    }

    async fn summaries(&self) -> Result<Vec<PageSummary>, PageServiceError> {
        Ok(self
            .store
            .list_pages()
            .await?
            .into_iter()
            .map(PageSummary::from)
            .collect())
    }

    /// Apply a partial update
    ///
    /// A title or content change re-derives the searchable text from the
    /// resulting title and content, unless the update supplies one.
    pub async fn update_page(
        &self,
        id: &str,
        mut update: PageUpdate,
    ) -> Result<Page, PageServiceError> {
        if update.touches_text() && update.searchable_text.is_none() {
            let current = self.require_page(id).await?;
            let title = update.title.as_deref().unwrap_or(&current.title);
            let content = update.content.as_deref().unwrap_or(&current.content);
            update.searchable_text = Some(Some(searchable_text_for(title, content)));
        }

        self.store
            .update_page(id, update)
            .await?
            .ok_or_else(|| PageServiceError::page_not_found(id))
    }

    /// Delete a page and its images; its children keep the stale parent id
    /// and surface as roots in the tree
    ///
    /// Returns the ids of every page that was below it.
    pub async fn delete_page(&self, id: &str) -> Result<Vec<String>, PageServiceError> {
        let detached = hierarchy::descendant_ids(&self.summaries().await?, id);
        if !self.store.delete_page(id).await? {
            return Err(PageServiceError::page_not_found(id));
        }
        if detached.is_empty() {
            tracing::debug!("Deleted page {}", id);
        } else {
            tracing::info!(
                "Deleted page {}; {} pages below it are now detached",
                id,
                detached.len()
            );
        }
        Ok(detached)
    }

    //
    // HIERARCHY
    //

    pub async fn tree(&self) -> Result<Vec<PageNode>, PageServiceError> {
        Ok(hierarchy::organize_hierarchy(self.summaries().await?))
    }

    pub async fn breadcrumbs(&self, id: &str) -> Result<Vec<PageSummary>, PageServiceError> {
        let pages = self.summaries().await?;
        let trail = hierarchy::breadcrumbs(&pages, id);
        if trail.is_empty() {
            return Err(PageServiceError::page_not_found(id));
        }
        Ok(trail)
    }

    /// Move a page to an explicit parent and order; returns the moved page
    pub async fn move_page(&self, request: MoveRequest) -> Result<Page, PageServiceError> {
        let plan = self.store.move_page(&request).await??;
        tracing::info!(
            "Moved page {} to order {} under {:?}",
            plan.page_id,
            plan.new_order,
            plan.new_parent_id
        );
        self.require_page(&plan.page_id).await
    }

    /// Drop `moved_id` onto `target_id`
    ///
    /// `Ok(None)` when a page is dropped onto itself; nothing changes.
    pub async fn drop_page(
        &self,
        moved_id: &str,
        target_id: &str,
        position: DropPosition,
    ) -> Result<Option<Page>, PageServiceError> {
        let target = self.require_page(target_id).await?.summary();
        match MoveRequest::from_drop(moved_id, &target, position) {
            Some(request) => self.move_page(request).await.map(Some),
            None => Ok(None),
        }
    }

    //
    // SEARCH
    //

    /// Full-text search; blank queries return nothing without touching the
    /// index
    pub async fn search(&self, raw: &str) -> Result<Vec<Page>, PageServiceError> {
        let Some(query) = SearchQuery::prepare(raw) else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .search_pages(&query.fts, &query.term, SEARCH_LIMIT)
            .await?)
    }

    /// Search results with highlighted snippets
    pub async fn search_hits(&self, raw: &str) -> Result<Vec<SearchHit>, PageServiceError> {
        let Some(query) = SearchQuery::prepare(raw) else {
            return Ok(Vec::new());
        };
        let pages = self
            .store
            .search_pages(&query.fts, &query.term, SEARCH_LIMIT)
            .await?;
        Ok(pages
            .into_iter()
            .map(|page| {
                let text = extract_searchable_text(&page.content);
                let snippet = search_snippet(&text, &query.term);
                SearchHit { page, snippet }
            })
            .collect())
    }

    /// Recompute `searchable_text` for every page, then rebuild the index
    ///
    /// Returns the number of pages whose text changed.
    pub async fn backfill_searchable_text(&self) -> Result<usize, PageServiceError> {
        self.backfill_searchable_text_with(IndexMode::Searchable).await
    }

    /// Backfill using the given extractor
    ///
    /// Page writes keep storing [`IndexMode::Searchable`] text, so an
    /// [`IndexMode::Indexable`] backfill holds until a page is next saved.
    pub async fn backfill_searchable_text_with(
        &self,
        mode: IndexMode,
    ) -> Result<usize, PageServiceError> {
        let mut changed = 0;
        for page in self.store.list_pages().await? {
            let fresh = mode.text_for(&page.title, &page.content);
            if page.searchable_text.as_deref() == Some(fresh.as_str()) {
                continue;
            }
            let update = PageUpdate {
                searchable_text: Some(Some(fresh)),
                ..PageUpdate::default()
            };
            self.store.update_page(&page.id, update).await?;
            changed += 1;
        }

        self.store.rebuild_search_index().await?;
        tracing::info!("Backfilled {:?} text for {} pages", mode, changed);
        Ok(changed)
    }

    //
    // IMAGES
    //

    pub async fn list_images(&self) -> Result<Vec<Image>, PageServiceError> {
        Ok(self.store.list_images(None).await?)
    }

    pub async fn create_image(&self, input: CreateImage) -> Result<Image, PageServiceError> {
        let input = input.validate()?;
        let now = models::now();
        let image = Image {
            id: Uuid::new_v4().to_string(),
            filename: input.filename,
            original_name: input.original_name,
            mime_type: input.mime_type,
            size: input.size,
            page_id: input.page_id,
            created_at: now,
            updated_at: now,
        };
        Ok(self.store.create_image(image).await?)
    }

    /// Image with its owning page
    pub async fn get_image(&self, id: &str) -> Result<ImageWithPage, PageServiceError> {
        let image = self
            .store
            .get_image(id)
            .await?
            .ok_or_else(|| PageServiceError::image_not_found(id))?;
        let page = self.store.get_page(&image.page_id).await?;
        Ok(ImageWithPage { image, page })
    }

    pub async fn update_image(
        &self,
        id: &str,
        update: ImageUpdate,
    ) -> Result<Image, PageServiceError> {
        self.store
            .update_image(id, update)
            .await?
            .ok_or_else(|| PageServiceError::image_not_found(id))
    }

    pub async fn delete_image(&self, id: &str) -> Result<(), PageServiceError> {
        if !self.store.delete_image(id).await? {
            return Err(PageServiceError::image_not_found(id));
        }
        Ok(())
    }

    //
    // SETTINGS
    //

    /// Current settings, writing the defaults on first read
    pub async fn get_settings(&self) -> Result<Settings, PageServiceError> {
        if let Some(settings) = self.store.get_settings().await? {
            return Ok(settings);
        }
        tracing::info!("No settings stored yet, writing defaults");
        Ok(self.store.save_settings(Settings::defaults(models::now())).await?)
    }

    /// Upsert: fields not in `update` keep their current (or default) value
    pub async fn update_settings(
        &self,
        update: SettingsUpdate,
    ) -> Result<Settings, PageServiceError> {
        let now = models::now();
        let mut settings = match self.store.get_settings().await? {
            Some(existing) => existing,
            None => Settings::defaults(now),
        };
        update.apply_to(&mut settings);
        settings.updated_at = now;
        Ok(self.store.save_settings(settings).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_search_query() {
        assert_eq!(SearchQuery::prepare("   "), None);
        assert_eq!(SearchQuery::prepare("\"'\u{2019}"), None);

        let single = SearchQuery::prepare("  rust ").unwrap();
        assert_eq!(single.fts, "\"rust\"");
        assert_eq!(single.term, "rust");

        let phrase = SearchQuery::prepare("l'\"hello world\"").unwrap();
        assert_eq!(phrase.fts, "\"lhello world\"");
        assert_eq!(phrase.term, "lhello world");

        assert_eq!(SearchQuery::prepare("NOT").unwrap().fts, "\"NOT\"");
        assert_eq!(SearchQuery::prepare("c++").unwrap().fts, "\"c++\"");
    }

    #[tokio::test]
    async fn test_create_page_defaults() {
        let service = PageService::in_memory();
        let page = service.create_page(CreatePage::default()).await.unwrap();

        assert_eq!(page.title, DEFAULT_PAGE_TITLE);
        assert_eq!(page.order, 0);
        assert!(page.tags.is_empty());
        assert_eq!(Document::parse(&page.content).unwrap().len(), 1);
        assert_eq!(page.searchable_text.as_deref(), Some(DEFAULT_PAGE_TITLE));
    }

    #[tokio::test]
    async fn test_update_rederives_searchable_text() {
        let service = PageService::in_memory();
        let page = service.create_page(CreatePage::titled("Draft")).await.unwrap();

        let content = r#"[{"type":"paragraph","content":[{"type":"text","text":"body"}]}]"#;
        let updated = service
            .update_page(&page.id, PageUpdate::new().with_content(content))
            .await
            .unwrap();
        assert_eq!(updated.searchable_text.as_deref(), Some("Draft body"));

        let favorite = service
            .update_page(&page.id, PageUpdate::new().with_favorite(true))
            .await
            .unwrap();
        assert_eq!(favorite.searchable_text.as_deref(), Some("Draft body"));
    }

    #[tokio::test]
    async fn test_missing_pages_are_not_found() {
        let service = PageService::in_memory();
        assert!(service.get_page("nope").await.unwrap_err().is_not_found());
        assert!(service.delete_page("nope").await.unwrap_err().is_not_found());
        assert!(service
            .update_page("nope", PageUpdate::new().with_title("x"))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(service.create_subpage("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_blank_search_returns_nothing() {
        let service = PageService::in_memory();
        service.create_page(CreatePage::titled("Anything")).await.unwrap();
        assert!(service.search("  ").await.unwrap().is_empty());
        assert!(service.search("''").await.unwrap().is_empty());
        assert_eq!(service.search("anything").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settings_upsert() {
        let service = PageService::in_memory();
        let defaults = service.get_settings().await.unwrap();
        assert!(defaults.fallback_enabled);

        let updated = service
            .update_settings(SettingsUpdate {
                lm_studio_model: Some("qwen2.5-7b-instruct".into()),
                ..SettingsUpdate::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.lm_studio_model.as_deref(), Some("qwen2.5-7b-instruct"));
        assert_eq!(updated.lm_studio_url, defaults.lm_studio_url);
    }
}
