//! In-memory PageStore
//!
//! Keeps pages, images and settings in `HashMap`s behind one tokio `RwLock`.
//! Search is a case-insensitive substring match on title and searchable
//! text instead of FTS5, which is close enough for tests.

use crate::db::page_store::PageStore;
use crate::hierarchy::{plan_move, MoveRequest, OrderEntry, PlanError, ReorderPlan};
use crate::models::{self, Image, ImageUpdate, Page, PageSummary, PageUpdate, Settings};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    pages: HashMap<String, Page>,
    images: HashMap<String, Image>,
    settings: Option<Settings>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_pages<'a>(pages: impl Iterator<Item = &'a Page>) -> Vec<Page> {
    let mut out: Vec<Page> = pages.cloned().collect();
    out.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
    out
}

fn newest_first(mut images: Vec<Image>) -> Vec<Image> {
    images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    images
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn create_page(&self, page: Page) -> Result<Page> {
        let mut tables = self.tables.write().await;
        if tables.pages.contains_key(&page.id) {
            anyhow::bail!("Page {} already exists", page.id);
        }
        tables.pages.insert(page.id.clone(), page.clone());
        Ok(page)
    }

    async fn get_page(&self, id: &str) -> Result<Option<Page>> {
        Ok(self.tables.read().await.pages.get(id).cloned())
    }

    async fn list_pages(&self) -> Result<Vec<Page>> {
        Ok(sorted_pages(self.tables.read().await.pages.values()))
    }

    async fn list_children(&self, parent_id: &str) -> Result<Vec<PageSummary>> {
        let tables = self.tables.read().await;
        let children = tables
            .pages
            .values()
            .filter(|p| p.parent_id.as_deref() == Some(parent_id));
        Ok(sorted_pages(children).into_iter().map(PageSummary::from).collect())
    }

    async fn update_page(&self, id: &str, update: PageUpdate) -> Result<Option<Page>> {
        let mut tables = self.tables.write().await;
        let Some(page) = tables.pages.get_mut(id) else {
            return Ok(None);
        };
        update.apply_to(page);
        page.updated_at = models::now();
        Ok(Some(page.clone()))
    }

    async fn delete_page(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.pages.remove(id).is_none() {
            return Ok(false);
        }
        tables.images.retain(|_, image| image.page_id != id);
        Ok(true)
    }

    async fn move_page(
        &self,
        request: &MoveRequest,
    ) -> Result<std::result::Result<ReorderPlan, PlanError>> {
        let mut tables = self.tables.write().await;
        let snapshot: Vec<OrderEntry> = tables
            .pages
            .values()
            .map(|p| OrderEntry {
                id: p.id.clone(),
                parent_id: p.parent_id.clone(),
                order: p.order,
            })
            .collect();

        let plan = match plan_move(&snapshot, request) {
            Ok(plan) => plan,
            Err(rejected) => return Ok(Err(rejected)),
        };

        let now = models::now();
        for update in &plan.sibling_updates {
            if let Some(page) = tables.pages.get_mut(&update.id) {
                page.order = update.order;
                page.updated_at = now;
            }
        }
        if let Some(page) = tables.pages.get_mut(&plan.page_id) {
            page.order = plan.new_order;
            page.parent_id = plan.new_parent_id.clone();
            page.updated_at = now;
        }
        Ok(Ok(plan))
    }

    async fn search_pages(&self, _fts_query: &str, term: &str, limit: usize) -> Result<Vec<Page>> {
        let needle = term.to_lowercase();
        let tables = self.tables.read().await;

        let mut hits: Vec<(bool, Page)> = tables
            .pages
            .values()
            .filter_map(|page| {
                let in_title = page.title.to_lowercase().contains(&needle);
                let in_text = page
                    .searchable_text
                    .as_deref()
                    .is_some_and(|t| t.to_lowercase().contains(&needle));
                (in_title || in_text).then(|| (in_title, page.clone()))
            })
            .collect();

        hits.sort_by(|(a_title, a), (b_title, b)| {
            b_title.cmp(a_title).then(b.updated_at.cmp(&a.updated_at))
        });
        Ok(hits.into_iter().take(limit).map(|(_, page)| page).collect())
    }

    async fn rebuild_search_index(&self) -> Result<()> {
        Ok(())
    }

    async fn create_image(&self, image: Image) -> Result<Image> {
        let mut tables = self.tables.write().await;
        if !tables.pages.contains_key(&image.page_id) {
            anyhow::bail!("Image {} references missing page {}", image.id, image.page_id);
        }
        tables.images.insert(image.id.clone(), image.clone());
        Ok(image)
    }

    async fn get_image(&self, id: &str) -> Result<Option<Image>> {
        Ok(self.tables.read().await.images.get(id).cloned())
    }

    async fn list_images(&self, page_id: Option<&str>) -> Result<Vec<Image>> {
        let tables = self.tables.read().await;
        let images = tables
            .images
            .values()
            .filter(|image| page_id.map_or(true, |id| image.page_id == id))
            .cloned()
            .collect();
        Ok(newest_first(images))
    }

    async fn update_image(&self, id: &str, update: ImageUpdate) -> Result<Option<Image>> {
        let mut tables = self.tables.write().await;
        let Some(image) = tables.images.get_mut(id) else {
            return Ok(None);
        };
        update.apply_to(image);
        image.updated_at = models::now();
        Ok(Some(image.clone()))
    }

    async fn delete_image(&self, id: &str) -> Result<bool> {
        Ok(self.tables.write().await.images.remove(id).is_some())
    }

    async fn get_settings(&self) -> Result<Option<Settings>> {
        Ok(self.tables.read().await.settings.clone())
    }

    async fn save_settings(&self, settings: Settings) -> Result<Settings> {
        self.tables.write().await.settings = Some(settings.clone());
        Ok(settings)
    }
}
