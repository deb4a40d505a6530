//! Running assistant tasks against stored pages
//!
//! Loads the page's document, runs the task, then writes the result back.
//! Edits saved while the task ran are kept: the task's changes are merged
//! into the latest revision by block id.
//! Whole-document translation and correction produce a second document,
//! stored as a child page named after the task.

use super::error::AssistantError;
use super::orchestrator::Orchestrator;
use super::prompts::TaskKind;
use crate::diff::DiffMode;
use crate::models::{CreatePage, Document, Page, PageUpdate};
use crate::services::PageService;
use serde::{Deserialize, Serialize};
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub page_id: String,
    pub task: TaskKind,
    /// Selected blocks; empty means the whole page
    #[serde(default)]
    pub block_ids: Vec<String>,
    /// Correction display mode
    #[serde(default)]
    pub mode: DiffMode,
}

impl TaskRequest {
    pub fn whole_page(page_id: impl Into<String>, task: TaskKind) -> Self {
        Self {
            page_id: page_id.into(),
            task,
            block_ids: Vec::new(),
            mode: DiffMode::default(),
        }
    }

    pub fn for_blocks(mut self, block_ids: Vec<String>) -> Self {
        self.block_ids = block_ids;
        self
    }

    pub fn with_mode(mut self, mode: DiffMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_selection(&self) -> bool {
        !self.block_ids.is_empty()
    }

    pub fn validate(&self) -> Result<(), AssistantError> {
        if self.page_id.trim().is_empty() {
            return Err(AssistantError::document("pageId is required"));
        }
        if self.task == TaskKind::Summary && self.is_selection() {
            return Err(AssistantError::document(
                "summary works on whole pages only",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    /// The page after the task, content written back
    pub page: Page,
    /// Child page holding a translated or corrected copy
    pub output_page: Option<Page>,
}

impl Orchestrator {
    /// Claim the task slot now and return the work as a future
    ///
    /// Validation and the busy check happen before anything is spawned, so
    /// callers can answer synchronously and run the future in the
    /// background.
    pub fn start_page_task(
        &self,
        pages: PageService,
        request: TaskRequest,
    ) -> Result<impl Future<Output = Result<TaskOutcome, AssistantError>> + Send + 'static, AssistantError>
    {
        request.validate()?;
        let guard = self.claim(request.task)?;
        let orchestrator = self.clone();

        Ok(async move {
            let result = orchestrator.run_page_task(&guard, &pages, &request).await;
            match &result {
                Ok(outcome) => tracing::info!(
                    "{} finished on page {}",
                    request.task,
                    outcome.page.id
                ),
                // Load failures were already reported by `send`
                Err(AssistantError::EngineLoad(_)) => {}
                Err(e) => {
                    tracing::error!("{} failed on page {}: {}", request.task, request.page_id, e);
                    orchestrator.emit(super::AssistantEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
            orchestrator.finish(guard);
            result
        })
    }

    /// Run a task on a page and wait for it
    pub async fn run_page_task_now(
        &self,
        pages: &PageService,
        request: TaskRequest,
    ) -> Result<TaskOutcome, AssistantError> {
        self.start_page_task(pages.clone(), request)?.await
    }

    async fn run_page_task(
        &self,
        guard: &super::orchestrator::TaskGuard,
        pages: &PageService,
        request: &TaskRequest,
    ) -> Result<TaskOutcome, AssistantError> {
        let page = pages.get_page(&request.page_id).await?.page;
        let base = Document::parse_lossy(&page.content);
        let mut document = base.clone();

        let output = match (request.task, request.is_selection()) {
            (TaskKind::Translation, false) => {
                Some(self.translate_document_with(guard, &mut document).await?)
            }
            (TaskKind::Correction, false) => Some(
                self.correct_document_with(guard, &mut document, request.mode)
                    .await?,
            ),
            (TaskKind::Summary, _) => {
                self.summarize_document_with(guard, &mut document).await?;
                None
            }
            (TaskKind::Develop, false) => {
                self.develop_document_with(guard, &mut document).await?;
                None
            }
            (TaskKind::Translation, true) => {
                self.translate_blocks_with(guard, &mut document, &request.block_ids)
                    .await?;
                None
            }
            (TaskKind::Correction, true) => {
                self.correct_blocks_with(guard, &mut document, &request.block_ids, request.mode)
                    .await?;
                None
            }
            (TaskKind::Develop, true) => {
                self.develop_blocks_with(guard, &mut document, &request.block_ids)
                    .await?;
                None
            }
        };

        // The page may have been edited while the model was generating
        let latest = pages.get_page(&page.id).await?.page;
        if latest.updated_at != page.updated_at || latest.content != page.content {
            tracing::info!(
                "Page {} changed during the {} task, merging task edits",
                page.id,
                request.task
            );
            let mut merged = Document::parse_lossy(&latest.content);
            merged.merge_edits(&base, &document);
            document = merged;
        }

        let page = pages
            .update_page(&page.id, PageUpdate::new().with_content(document.to_json()))
            .await?;

        let output_page = match output {
            Some(output) => {
                let copy = CreatePage {
                    content: Some(output.to_json()),
                    ..CreatePage::titled(format!("{} ({})", page.title, request.task))
                        .under(&page.id)
                };
                Some(pages.create_page(copy).await?)
            }
            None => None,
        };

        Ok(TaskOutcome { page, output_page })
    }
}
