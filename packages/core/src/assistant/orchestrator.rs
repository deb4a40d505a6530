//! AI Task Orchestrator
//!
//! Sequences prompts to an [`InferenceEngine`] and routes the streamed text
//! into document blocks. Only one task runs at a time: every operation
//! claims the task slot through a [`TaskGuard`] and a second claim fails
//! with [`AssistantError::Busy`].
//!
//! Prompts are awaited one after another. Each delta re-renders the target
//! block from the text accumulated so far and publishes a
//! [`AssistantEvent::BlockUpdated`].

use super::error::AssistantError;
use super::events::{AssistantEvent, DocumentSide};
use super::prompts::{
    self, TaskKind, ASSISTANT_COLOR, CORRECTION_PLACEHOLDER, GENERATION_ERROR_MESSAGE,
    INPUT_TOO_LONG_MESSAGE, INTERMEDIATE_SUMMARY_PREFIX, PLACEHOLDER_COLOR, SUMMARY_PLACEHOLDER,
    TRANSLATION_PLACEHOLDER,
};
use super::summary::SummaryFold;
use crate::diff::{annotate, redline, Annotated, DiffMode};
use crate::markdown::{blocks_to_markdown, markdown_to_blocks};
use crate::models::{Block, Document};
use crate::text::block_to_string;
use futures::StreamExt;
use notesai_llm_engine::{EngineError, InferenceEngine, InitProgress, ProgressCallback};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Buffered events per subscriber before the slowest one starts lagging
pub const EVENT_CAPACITY: usize = 256;

struct ActiveTask {
    id: u64,
    kind: TaskKind,
    cancelled: Arc<AtomicBool>,
}

struct Shared {
    active: Mutex<Option<ActiveTask>>,
    next_id: AtomicU64,
    last_stats: Mutex<Option<String>>,
    /// Whether the engine's model was already downloaded, once known
    model_cached: Mutex<Option<bool>>,
    events: broadcast::Sender<AssistantEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Proof that the task slot is held; releases it on drop
pub struct TaskGuard {
    shared: Arc<Shared>,
    id: u64,
    kind: TaskKind,
    cancelled: Arc<AtomicBool>,
}

impl TaskGuard {
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Set once `stop` was requested for this task
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let mut active = lock(&self.shared.active);
        // After a stop the slot may already belong to a newer task
        if active.as_ref().map(|task| task.id) == Some(self.id) {
            *active = None;
        }
    }
}

/// Snapshot for the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantStatus {
    pub task: Option<TaskKind>,
    pub engine_loaded: bool,
    pub runtime_stats: Option<String>,
    /// `None` until the engine was asked, on the first load
    pub model_cached: Option<bool>,
}

#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<dyn InferenceEngine>,
    shared: Arc<Shared>,
}

fn generation_failed(err: EngineError) -> AssistantError {
    AssistantError::Generation(err.to_string())
}

/// Paragraph shown in the output document until its block is processed
fn placeholder(id: &str, text: &str, color: &str) -> Block {
    let mut block = Block::paragraph(text).with_id(id);
    block.set_text_color(color);
    block
}

fn assistant_paragraph() -> Block {
    let mut block = Block::paragraph("");
    block.set_text_color(ASSISTANT_COLOR);
    block
}

/// Empty block of the same type and props, colored as assistant output
fn sibling_like(block: &Block) -> Block {
    let mut sibling = Block::new(block.block_type.clone());
    sibling.props = block.props.clone();
    sibling.set_text_color(ASSISTANT_COLOR);
    sibling
}

/// Output document of a translation or correction: placeholders for every
/// block holding text, verbatim copies of the rest
fn output_skeleton(source: &Document, text: &str, color: &str) -> Document {
    source
        .blocks
        .iter()
        .map(|block| {
            if block_to_string(block).is_empty() {
                block.clone()
            } else {
                placeholder(&block.id, text, color)
            }
        })
        .collect::<Vec<_>>()
        .into()
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            engine,
            shared: Arc::new(Shared {
                active: Mutex::new(None),
                next_id: AtomicU64::new(1),
                last_stats: Mutex::new(None),
                model_cached: Mutex::new(None),
                events,
            }),
        }
    }

    /// Same task slot and event channel, different engine
    ///
    /// Used when settings change: subscribers keep their stream and a task
    /// started on the old engine still blocks new ones until it ends.
    pub fn with_engine(&self, engine: Arc<dyn InferenceEngine>) -> Self {
        *lock(&self.shared.model_cached) = None;
        Self {
            engine,
            shared: self.shared.clone(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.engine
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.shared.events.subscribe()
    }

    pub(crate) fn emit(&self, event: AssistantEvent) {
        // No subscribers is fine
        let _ = self.shared.events.send(event);
    }

    pub fn current_task(&self) -> Option<TaskKind> {
        lock(&self.shared.active).as_ref().map(|task| task.kind)
    }

    pub fn last_stats(&self) -> Option<String> {
        lock(&self.shared.last_stats).clone()
    }

    pub fn status(&self) -> AssistantStatus {
        AssistantStatus {
            task: self.current_task(),
            engine_loaded: self.engine.is_loaded(),
            runtime_stats: self.last_stats(),
            model_cached: *lock(&self.shared.model_cached),
        }
    }

    /// Claim the task slot
    pub fn claim(&self, kind: TaskKind) -> Result<TaskGuard, AssistantError> {
        let mut active = lock(&self.shared.active);
        if let Some(current) = active.as_ref() {
            return Err(AssistantError::Busy {
                current: current.kind,
            });
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        *active = Some(ActiveTask {
            id,
            kind,
            cancelled: cancelled.clone(),
        });
        tracing::debug!("Task {} ({}) started", id, kind);

        Ok(TaskGuard {
            shared: self.shared.clone(),
            id,
            kind,
            cancelled,
        })
    }

    /// Release the slot, then tell subscribers the task is over
    pub(crate) fn finish(&self, guard: TaskGuard) {
        let kind = guard.kind;
        drop(guard);
        self.emit(AssistantEvent::Status {
            task: None,
            message: String::new(),
        });
        self.emit(AssistantEvent::Finished { task: kind });
    }

    /// Interrupt the running generation and free the slot
    ///
    /// Blocks already written by streamed deltas keep their content.
    pub async fn stop(&self) {
        let stopped = lock(&self.shared.active).take();
        if let Some(task) = stopped {
            task.cancelled.store(true, Ordering::SeqCst);
            tracing::info!("Stopping {} task", task.kind);
        }
        self.engine.interrupt().await;
        self.emit(AssistantEvent::Status {
            task: None,
            message: String::new(),
        });
    }

    //
    // PROMPTS
    //

    async fn ensure_loaded(&self) -> Result<(), AssistantError> {
        if self.engine.is_loaded() {
            return Ok(());
        }

        // Lets the client tell a first download from a load off disk
        let model_cached = self.check_model_cache().await;
        let events = self.shared.events.clone();
        let progress: ProgressCallback = Arc::new(move |report: InitProgress| {
            let _ = events.send(AssistantEvent::Loading {
                progress: report.progress,
                text: report.text,
                time_elapsed: report.time_elapsed,
                model_cached,
            });
        });

        if let Err(e) = self.engine.load(progress).await {
            let err = AssistantError::engine_load(&e);
            tracing::error!("{}", err);
            self.emit(AssistantEvent::Error {
                message: err.to_string(),
            });
            return Err(err);
        }
        tracing::info!("Inference engine loaded");
        self.check_model_cache().await;
        Ok(())
    }

    async fn check_model_cache(&self) -> Option<bool> {
        let cached = match self.engine.is_model_cached().await {
            Ok(cached) => Some(cached),
            Err(e) => {
                tracing::warn!("Could not check the model cache: {}", e);
                None
            }
        };
        tracing::debug!("Model cached: {:?}", cached);
        *lock(&self.shared.model_cached) = cached;
        cached
    }

    /// Run one prompt, calling `on_update` with the accumulated text after
    /// every delta
    ///
    /// Returns `Ok(None)` for an empty prompt and for failures reported to
    /// subscribers (input too long, generation errors). Only an engine that
    /// cannot be loaded is returned as an error, since no further prompt of
    /// the operation can succeed.
    pub async fn send(
        &self,
        task: TaskKind,
        prompt: &str,
        on_update: &mut (dyn FnMut(&str) + Send),
    ) -> Result<Option<String>, AssistantError> {
        if prompt.is_empty() {
            return Ok(None);
        }

        self.emit(AssistantEvent::Status {
            task: Some(task),
            message: task.loading_message().to_string(),
        });
        self.ensure_loaded().await?;

        match self.generate(task, prompt, on_update).await {
            Ok(text) => Ok(Some(text)),
            Err(AssistantError::InputTooLong) => {
                tracing::warn!("{} prompt over the input budget, skipped", task);
                self.emit(AssistantEvent::Error {
                    message: INPUT_TOO_LONG_MESSAGE.to_string(),
                });
                Ok(None)
            }
            Err(e) => {
                tracing::error!("{} generation failed: {}", task, e);
                self.emit(AssistantEvent::Error {
                    message: GENERATION_ERROR_MESSAGE.to_string(),
                });
                Ok(None)
            }
        }
    }

    async fn generate(
        &self,
        task: TaskKind,
        prompt: &str,
        on_update: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, AssistantError> {
        let messages = task.messages(prompt);
        if prompts::check_input_length(&messages) {
            return Err(AssistantError::InputTooLong);
        }

        self.engine.reset_chat().await.map_err(generation_failed)?;
        let mut deltas = self
            .engine
            .stream_chat(messages)
            .await
            .map_err(generation_failed)?;

        let mut text = String::new();
        while let Some(delta) = deltas.next().await {
            text.push_str(&delta.map_err(generation_failed)?);
            on_update(&text);
        }

        match self.engine.runtime_stats().await {
            Ok(stats) => {
                *lock(&self.shared.last_stats) = Some(stats.clone());
                self.emit(AssistantEvent::Stats { text: stats });
            }
            Err(e) => tracing::warn!("Runtime stats unavailable: {}", e),
        }
        Ok(text)
    }

    //
    // BLOCK EDITS
    //

    fn update_block(
        &self,
        document: &mut Document,
        side: DocumentSide,
        id: &str,
        edit: impl FnOnce(&mut Block),
    ) {
        match document.find_mut(id) {
            Some(block) => {
                edit(block);
                self.emit(AssistantEvent::BlockUpdated {
                    side,
                    block: block.clone(),
                });
            }
            None => tracing::warn!("Block {} is gone from the {:?} document", id, side),
        }
    }

    /// Insert after `after` (or at the top), returning the new block's id
    fn insert_block(
        &self,
        document: &mut Document,
        after: Option<&str>,
        block: Block,
    ) -> Option<String> {
        let ids = match after {
            Some(reference) => document.insert_after(reference, vec![block])?,
            None => {
                let first = document.blocks.first().map(|b| b.id.clone());
                match first {
                    Some(first) => document.insert_before(&first, vec![block])?,
                    None => document.push(vec![block]),
                }
            }
        };
        let id = ids.into_iter().next()?;
        let inserted = document.find(&id).cloned()?;
        self.emit(AssistantEvent::BlocksInserted {
            side: DocumentSide::Source,
            after_id: after.map(str::to_string),
            blocks: vec![inserted],
        });
        Some(id)
    }

    /// Swap a streaming block for the blocks parsed from the final markdown
    fn replace_with_markdown(&self, document: &mut Document, id: &str, markdown: &str) {
        let mut blocks = markdown_to_blocks(markdown);
        for block in &mut blocks {
            block.set_text_color(ASSISTANT_COLOR);
        }

        let Some(ids) = document.replace(id, blocks) else {
            tracing::warn!("Block {} is gone, dropping generated text", id);
            return;
        };
        let blocks = ids
            .iter()
            .filter_map(|new_id| document.find(new_id).cloned())
            .collect();
        self.emit(AssistantEvent::BlocksReplaced {
            side: DocumentSide::Source,
            replaced_id: Some(id.to_string()),
            blocks,
        });
    }

    //
    // WHOLE-DOCUMENT TASKS
    //

    /// Translate every block into a second document
    ///
    /// The source is flattened first. The returned document has one block
    /// per source block, under the same id.
    pub async fn translate_document(
        &self,
        source: &mut Document,
    ) -> Result<Document, AssistantError> {
        let guard = self.claim(TaskKind::Translation)?;
        let result = self.translate_document_with(&guard, source).await;
        self.finish(guard);
        result
    }

    pub(crate) async fn translate_document_with(
        &self,
        guard: &TaskGuard,
        source: &mut Document,
    ) -> Result<Document, AssistantError> {
        source.flatten();
        let mut output = output_skeleton(source, TRANSLATION_PLACEHOLDER, PLACEHOLDER_COLOR);
        self.emit(AssistantEvent::BlocksReplaced {
            side: DocumentSide::Output,
            replaced_id: None,
            blocks: output.blocks.clone(),
        });

        for block in &source.blocks {
            if guard.is_cancelled() {
                break;
            }
            if block_to_string(block).is_empty() {
                continue;
            }

            let markdown = blocks_to_markdown(std::slice::from_ref(block));
            let prompt = prompts::translation_prompt(&markdown);
            let id = block.id.as_str();
            self.send(TaskKind::Translation, &prompt, &mut |partial: &str| {
                let Some(first) = markdown_to_blocks(partial).into_iter().next() else {
                    return;
                };
                self.update_block(&mut output, DocumentSide::Output, id, |target| {
                    *target = first.with_id(id);
                });
            })
            .await?;
        }
        Ok(output)
    }

    /// Correct every block into a second document
    ///
    /// Word-by-word mode also annotates the source block; the diff modes
    /// write a redline into the output block only.
    pub async fn correct_document(
        &self,
        source: &mut Document,
        mode: DiffMode,
    ) -> Result<Document, AssistantError> {
        let guard = self.claim(TaskKind::Correction)?;
        let result = self.correct_document_with(&guard, source, mode).await;
        self.finish(guard);
        result
    }

    pub(crate) async fn correct_document_with(
        &self,
        guard: &TaskGuard,
        source: &mut Document,
        mode: DiffMode,
    ) -> Result<Document, AssistantError> {
        source.flatten();
        let mut output = output_skeleton(source, CORRECTION_PLACEHOLDER, ASSISTANT_COLOR);
        self.emit(AssistantEvent::BlocksReplaced {
            side: DocumentSide::Output,
            replaced_id: None,
            blocks: output.blocks.clone(),
        });

        for id in source.ids() {
            if guard.is_cancelled() {
                break;
            }
            let Some(original) = source.find(&id).map(block_to_string) else {
                continue;
            };
            if original.is_empty() {
                continue;
            }

            let prompt = prompts::correction_prompt(&original);
            self.send(TaskKind::Correction, &prompt, &mut |partial: &str| {
                if mode == DiffMode::WordByWord {
                    let Annotated {
                        original: source_runs,
                        corrected,
                    } = annotate(&original, partial, mode);
                    self.update_block(source, DocumentSide::Source, &id, |b| {
                        b.set_runs(source_runs)
                    });
                    self.update_block(&mut output, DocumentSide::Output, &id, |b| {
                        b.set_runs(corrected);
                        b.clear_text_color();
                    });
                } else {
                    let runs = redline(&original, partial, mode);
                    self.update_block(&mut output, DocumentSide::Output, &id, |b| {
                        b.set_runs(runs);
                        b.clear_text_color();
                    });
                }
            })
            .await?;
        }
        Ok(output)
    }

    /// Prepend a summary of the whole document
    ///
    /// One prompt per heading that has text below it, plus a final rollup.
    pub async fn summarize_document(&self, document: &mut Document) -> Result<(), AssistantError> {
        let guard = self.claim(TaskKind::Summary)?;
        let result = self.summarize_document_with(&guard, document).await;
        self.finish(guard);
        result
    }

    pub(crate) async fn summarize_document_with(
        &self,
        guard: &TaskGuard,
        document: &mut Document,
    ) -> Result<(), AssistantError> {
        document.flatten();
        let ids = document.ids();
        if ids.is_empty() {
            return Ok(());
        }

        let mut status = Block::paragraph(SUMMARY_PLACEHOLDER);
        status.set_text_color(ASSISTANT_COLOR);
        let summary_id = self
            .insert_block(document, None, status)
            .ok_or_else(|| AssistantError::document("could not place the summary block"))?;

        let mut fold = SummaryFold::default();
        for id in ids.iter().rev() {
            if guard.is_cancelled() {
                return Ok(());
            }
            let Some((level, text)) = document
                .find(id)
                .map(|block| (block.heading_level(), block_to_string(block)))
            else {
                continue;
            };
            let Some(step) = fold.visit(level, &text) else {
                continue;
            };

            tracing::debug!("Summarizing level {} section {:?}", step.level, text);
            let summary = self
                .send(TaskKind::Summary, &step.prompt, &mut |partial: &str| {
                    self.update_block(document, DocumentSide::Source, &summary_id, |b| {
                        b.set_plain_text(format!("{}{}", INTERMEDIATE_SUMMARY_PREFIX, partial));
                        b.set_text_color(ASSISTANT_COLOR);
                    });
                })
                .await?;
            fold.absorb(step.level, summary.as_deref().unwrap_or_default());
        }

        let remaining = fold.remaining();
        if remaining.is_empty() || guard.is_cancelled() {
            return Ok(());
        }

        let prompt = prompts::summary_prompt(&remaining, None);
        let summary = self
            .send(TaskKind::Summary, &prompt, &mut |partial: &str| {
                self.update_block(document, DocumentSide::Source, &summary_id, |b| {
                    b.set_plain_text(partial);
                    b.set_text_color(ASSISTANT_COLOR);
                });
            })
            .await?;

        if let Some(summary) = summary.filter(|s| !s.trim().is_empty()) {
            self.replace_with_markdown(document, &summary_id, &summary);
        }
        Ok(())
    }

    /// Append text developed from the document's content
    pub async fn develop_document(&self, document: &mut Document) -> Result<(), AssistantError> {
        let guard = self.claim(TaskKind::Develop)?;
        let result = self.develop_document_with(&guard, document).await;
        self.finish(guard);
        result
    }

    pub(crate) async fn develop_document_with(
        &self,
        _guard: &TaskGuard,
        document: &mut Document,
    ) -> Result<(), AssistantError> {
        document.flatten();
        let text = document
            .blocks
            .iter()
            .map(block_to_string)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let last = document.blocks.last().map(|b| b.id.clone());
        let Some(target_id) = self.insert_block(document, last.as_deref(), assistant_paragraph())
        else {
            return Err(AssistantError::document("could not place the developed block"));
        };
        if text.is_empty() {
            return Ok(());
        }

        let prompt = prompts::develop_prompt(&text);
        let developed = self
            .send(TaskKind::Develop, &prompt, &mut |partial: &str| {
                self.update_block(document, DocumentSide::Source, &target_id, |b| {
                    b.set_plain_text(partial)
                });
            })
            .await?;

        if let Some(developed) = developed.filter(|s| !s.trim().is_empty()) {
            self.replace_with_markdown(document, &target_id, &developed);
        }
        Ok(())
    }

    //
    // SELECTION TASKS
    //

    /// Insert a translation after each selected block
    pub async fn translate_blocks(
        &self,
        document: &mut Document,
        ids: &[String],
    ) -> Result<(), AssistantError> {
        let guard = self.claim(TaskKind::Translation)?;
        let result = self.translate_blocks_with(&guard, document, ids).await;
        self.finish(guard);
        result
    }

    pub(crate) async fn translate_blocks_with(
        &self,
        guard: &TaskGuard,
        document: &mut Document,
        ids: &[String],
    ) -> Result<(), AssistantError> {
        for id in ids {
            if guard.is_cancelled() {
                break;
            }
            let Some(block) = document.find(id) else {
                tracing::warn!("Selected block {} not found", id);
                continue;
            };
            if block_to_string(block).is_empty() {
                continue;
            }

            let markdown = blocks_to_markdown(std::slice::from_ref(block));
            let target = sibling_like(block);
            let Some(target_id) = self.insert_block(document, Some(id), target) else {
                continue;
            };

            let prompt = prompts::selection_translation_prompt(&markdown);
            self.send(TaskKind::Translation, &prompt, &mut |partial: &str| {
                let Some(first) = markdown_to_blocks(partial).into_iter().next() else {
                    return;
                };
                self.update_block(document, DocumentSide::Source, &target_id, |b| {
                    b.content = first.content
                });
            })
            .await?;
        }
        Ok(())
    }

    /// Insert a correction after each selected block
    ///
    /// Word-by-word mode also annotates the selected block itself.
    pub async fn correct_blocks(
        &self,
        document: &mut Document,
        ids: &[String],
        mode: DiffMode,
    ) -> Result<(), AssistantError> {
        let guard = self.claim(TaskKind::Correction)?;
        let result = self.correct_blocks_with(&guard, document, ids, mode).await;
        self.finish(guard);
        result
    }

    pub(crate) async fn correct_blocks_with(
        &self,
        guard: &TaskGuard,
        document: &mut Document,
        ids: &[String],
        mode: DiffMode,
    ) -> Result<(), AssistantError> {
        for id in ids {
            if guard.is_cancelled() {
                break;
            }
            let Some(block) = document.find(id) else {
                tracing::warn!("Selected block {} not found", id);
                continue;
            };
            let original = block_to_string(block);
            if block.content.is_none() || original.is_empty() {
                continue;
            }

            let target = sibling_like(block);
            let Some(target_id) = self.insert_block(document, Some(id), target) else {
                continue;
            };

            let prompt = prompts::correction_prompt(&original);
            self.send(TaskKind::Correction, &prompt, &mut |partial: &str| {
                if mode == DiffMode::WordByWord {
                    let Annotated {
                        original: source_runs,
                        corrected,
                    } = annotate(&original, partial, mode);
                    self.update_block(document, DocumentSide::Source, id, |b| {
                        b.set_runs(source_runs)
                    });
                    self.update_block(document, DocumentSide::Source, &target_id, |b| {
                        b.set_runs(corrected)
                    });
                } else {
                    let runs = redline(&original, partial, mode);
                    self.update_block(document, DocumentSide::Source, &target_id, |b| {
                        b.set_runs(runs)
                    });
                }
            })
            .await?;
        }
        Ok(())
    }

    /// Develop the selected blocks into one new paragraph below them
    pub async fn develop_blocks(
        &self,
        document: &mut Document,
        ids: &[String],
    ) -> Result<(), AssistantError> {
        let guard = self.claim(TaskKind::Develop)?;
        let result = self.develop_blocks_with(&guard, document, ids).await;
        self.finish(guard);
        result
    }

    pub(crate) async fn develop_blocks_with(
        &self,
        _guard: &TaskGuard,
        document: &mut Document,
        ids: &[String],
    ) -> Result<(), AssistantError> {
        let selected: Vec<&Block> = ids.iter().filter_map(|id| document.find(id)).collect();
        let Some(last) = selected.last().map(|b| b.id.clone()) else {
            return Err(AssistantError::document("none of the selected blocks exist"));
        };
        let text = selected
            .iter()
            .map(|b| block_to_string(b))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let Some(target_id) = self.insert_block(document, Some(&last), assistant_paragraph())
        else {
            return Ok(());
        };
        if text.is_empty() {
            return Ok(());
        }

        let prompt = prompts::develop_prompt(&text);
        self.send(TaskKind::Develop, &prompt, &mut |partial: &str| {
            self.update_block(document, DocumentSide::Source, &target_id, |b| {
                b.set_plain_text(partial)
            });
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesai_llm_engine::ScriptedEngine;

    fn orchestrator(engine: ScriptedEngine) -> (Orchestrator, Arc<ScriptedEngine>) {
        let engine = Arc::new(engine);
        (Orchestrator::new(engine.clone()), engine)
    }

    fn drain(rx: &mut broadcast::Receiver<AssistantEvent>) -> Vec<AssistantEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn errors(events: &[AssistantEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                AssistantEvent::Error { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_send_streams_accumulated_text() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        engine.push_reply("Hello brave world");

        let mut seen = Vec::new();
        let text = orchestrator
            .send(TaskKind::Develop, "ideas", &mut |partial: &str| seen.push(partial.to_string()))
            .await
            .unwrap();

        assert_eq!(text.as_deref(), Some("Hello brave world"));
        assert_eq!(seen, vec!["Hello", "Hello brave", "Hello brave world"]);
        assert_eq!(engine.prompts()[0], TaskKind::Develop.messages("ideas"));
        assert_eq!(orchestrator.last_stats().as_deref(), Some("prefill: n/a, decoding: n/a"));
    }

    #[tokio::test]
    async fn test_send_empty_prompt_is_noop() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        let result = orchestrator.send(TaskKind::Develop, "", &mut |_: &str| {}).await.unwrap();
        assert_eq!(result, None);
        assert_eq!(engine.load_calls(), 0);
    }

    #[tokio::test]
    async fn test_engine_loads_once() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::echoing("ok"));
        let mut rx = orchestrator.subscribe();
        orchestrator.send(TaskKind::Develop, "a", &mut |_: &str| {}).await.unwrap();
        orchestrator.send(TaskKind::Develop, "b", &mut |_: &str| {}).await.unwrap();

        assert_eq!(engine.load_calls(), 1);
        let loading = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, AssistantEvent::Loading { .. }))
            .count();
        assert_eq!(loading, 1);
    }

    #[tokio::test]
    async fn test_model_cache_is_reported_while_loading() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::echoing("ok"));
        engine.uncached();
        let mut rx = orchestrator.subscribe();
        assert_eq!(orchestrator.status().model_cached, None);

        orchestrator.send(TaskKind::Develop, "a", &mut |_: &str| {}).await.unwrap();

        let flags: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                AssistantEvent::Loading { model_cached, .. } => Some(model_cached),
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![Some(false)]);
        assert_eq!(orchestrator.status().model_cached, Some(true));

        let switched = orchestrator.with_engine(Arc::new(ScriptedEngine::new()));
        assert_eq!(switched.status().model_cached, None);
    }

    #[tokio::test]
    async fn test_load_failure_aborts() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        engine.fail_load("no GPU");
        let mut rx = orchestrator.subscribe();

        let err = orchestrator
            .send(TaskKind::Develop, "ideas", &mut |_: &str| {})
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::EngineLoad(_)));
        assert!(err.to_string().starts_with("Could not load the model because"));
        assert_eq!(errors(&drain(&mut rx)), vec![err.to_string()]);
    }

    #[tokio::test]
    async fn test_input_too_long_skips_engine() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::echoing("never"));
        let mut rx = orchestrator.subscribe();

        let prompt = "x".repeat(prompts::MAX_INPUT_CHARS);
        let result = orchestrator.send(TaskKind::Develop, &prompt, &mut |_: &str| {}).await.unwrap();

        assert_eq!(result, None);
        assert!(engine.prompts().is_empty());
        assert_eq!(errors(&drain(&mut rx)), vec![INPUT_TOO_LONG_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_generation_failure_reports_generic_error() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        engine.push_failure("boom");
        let mut rx = orchestrator.subscribe();

        let result = orchestrator.send(TaskKind::Develop, "ideas", &mut |_: &str| {}).await.unwrap();
        assert_eq!(result, None);
        assert_eq!(errors(&drain(&mut rx)), vec![GENERATION_ERROR_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_single_task_slot() {
        let (orchestrator, _engine) = orchestrator(ScriptedEngine::new());
        let guard = orchestrator.claim(TaskKind::Summary).unwrap();
        assert_eq!(orchestrator.current_task(), Some(TaskKind::Summary));

        let busy = orchestrator.claim(TaskKind::Develop).err().unwrap();
        assert!(matches!(busy, AssistantError::Busy { current: TaskKind::Summary }));

        let mut doc = Document::new_page();
        assert!(orchestrator.develop_document(&mut doc).await.is_err());

        drop(guard);
        assert_eq!(orchestrator.current_task(), None);
        assert!(orchestrator.claim(TaskKind::Develop).is_ok());
    }

    #[tokio::test]
    async fn test_stop_frees_slot_and_cancels() {
        let (orchestrator, _engine) = orchestrator(ScriptedEngine::new());
        let old = orchestrator.claim(TaskKind::Translation).unwrap();

        orchestrator.stop().await;
        assert!(old.is_cancelled());
        assert_eq!(orchestrator.current_task(), None);

        let fresh = orchestrator.claim(TaskKind::Develop).unwrap();
        drop(old);
        // The stale guard must not release the new task's slot
        assert_eq!(orchestrator.current_task(), Some(TaskKind::Develop));
        drop(fresh);
    }

    #[tokio::test]
    async fn test_translate_document_fills_output() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        engine.push_reply("# Hello").push_reply("World");

        let mut source = Document::new(vec![
            Block::heading(1, "Bonjour").with_id("h"),
            Block::paragraph("").with_id("empty"),
            Block::paragraph("Monde").with_id("p"),
        ]);
        let output = orchestrator.translate_document(&mut source).await.unwrap();

        assert_eq!(output.ids(), vec!["h", "empty", "p"]);
        assert_eq!(output.blocks[0].heading_level(), Some(1));
        assert_eq!(block_to_string(&output.blocks[0]), "Hello");
        assert_eq!(output.blocks[1], source.blocks[1]);
        assert_eq!(block_to_string(&output.blocks[2]), "World");
        assert_eq!(output.blocks[2].text_color(), None);

        let prompts = engine.user_prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts::translation_prompt("# Bonjour"));
        assert_eq!(orchestrator.current_task(), None);
    }

    #[tokio::test]
    async fn test_failed_block_keeps_placeholder() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        engine.push_failure("overloaded");

        let mut source = Document::new(vec![Block::paragraph("Salut").with_id("p")]);
        let output = orchestrator.translate_document(&mut source).await.unwrap();

        assert_eq!(block_to_string(&output.blocks[0]), TRANSLATION_PLACEHOLDER);
        assert_eq!(output.blocks[0].text_color(), Some(PLACEHOLDER_COLOR));
    }

    #[tokio::test]
    async fn test_correct_document_redline() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        engine.push_reply("le chat");

        let mut source = Document::new(vec![Block::paragraph("le chta").with_id("p")]);
        let output = orchestrator
            .correct_document(&mut source, DiffMode::WordDiff)
            .await
            .unwrap();

        let runs: Vec<_> = match output.blocks[0].inline() {
            Some(items) => items.to_vec(),
            None => Vec::new(),
        };
        assert!(runs.len() > 1);
        assert_eq!(block_to_string(&source.blocks[0]), "le chta");
        assert_eq!(
            engine.user_prompts()[0],
            prompts::correction_prompt("le chta")
        );
    }

    #[tokio::test]
    async fn test_correct_word_by_word_annotates_source() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        engine.push_reply("le chat");

        let mut source = Document::new(vec![Block::paragraph("le chta").with_id("p")]);
        let output = orchestrator
            .correct_document(&mut source, DiffMode::WordByWord)
            .await
            .unwrap();

        let expected = annotate("le chta", "le chat", DiffMode::WordByWord);
        let mut annotated_source = Block::paragraph("").with_id("p");
        annotated_source.set_runs(expected.original);
        assert_eq!(source.blocks[0].content, annotated_source.content);

        let mut annotated_output = Block::paragraph("");
        annotated_output.set_runs(expected.corrected);
        assert_eq!(output.blocks[0].content, annotated_output.content);
    }

    #[tokio::test]
    async fn test_summarize_replaces_status_block() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        engine
            .push_reply("section summary")
            .push_reply("**Overall** summary");

        let mut document = Document::new(vec![
            Block::heading(2, "Intro").with_id("h"),
            Block::paragraph("Some body text").with_id("p"),
        ]);
        orchestrator.summarize_document(&mut document).await.unwrap();

        let prompts = engine.user_prompts();
        assert_eq!(prompts[0], prompts::summary_prompt("Some body text", Some("Intro")));
        assert_eq!(prompts[1], prompts::summary_prompt("section summary", None));

        assert_eq!(document.len(), 3);
        assert_eq!(block_to_string(&document.blocks[0]), "Overall summary");
        assert_eq!(document.blocks[0].text_color(), Some(ASSISTANT_COLOR));
        assert_eq!(document.blocks[1].id, "h");
    }

    #[tokio::test]
    async fn test_develop_document_appends_blocks() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        engine.push_reply("First idea grown.\n\nSecond idea grown.");

        let mut document = Document::new(vec![
            Block::paragraph("idea one").with_id("a"),
            Block::paragraph("idea two").with_id("b"),
        ]);
        orchestrator.develop_document(&mut document).await.unwrap();

        assert_eq!(
            engine.user_prompts()[0],
            prompts::develop_prompt("idea one\nidea two")
        );
        assert_eq!(document.len(), 4);
        assert_eq!(block_to_string(&document.blocks[2]), "First idea grown.");
        assert_eq!(block_to_string(&document.blocks[3]), "Second idea grown.");
    }

    #[tokio::test]
    async fn test_translate_blocks_inserts_below_selection() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        engine.push_reply("Good morning");

        let mut document = Document::new(vec![
            Block::heading(2, "Bonjour").with_id("h"),
            Block::paragraph("untouched").with_id("p"),
        ]);
        orchestrator
            .translate_blocks(&mut document, &["h".to_string()])
            .await
            .unwrap();

        assert_eq!(document.len(), 3);
        let inserted = &document.blocks[1];
        assert_eq!(inserted.heading_level(), Some(2));
        assert_eq!(inserted.text_color(), Some(ASSISTANT_COLOR));
        assert_eq!(block_to_string(inserted), "Good morning");
        assert_eq!(
            engine.user_prompts()[0],
            prompts::selection_translation_prompt("## Bonjour")
        );
    }

    #[tokio::test]
    async fn test_correct_blocks_skips_empty() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        engine.push_reply("bonne journée");

        let mut document = Document::new(vec![
            Block::paragraph("").with_id("empty"),
            Block::paragraph("bone journée").with_id("p"),
        ]);
        let ids = vec!["empty".to_string(), "p".to_string()];
        orchestrator
            .correct_blocks(&mut document, &ids, DiffMode::CharDiff)
            .await
            .unwrap();

        assert_eq!(document.len(), 3);
        assert_eq!(document.blocks[1].id, "p");
        let expected = redline("bone journée", "bonne journée", DiffMode::CharDiff);
        let mut reference = Block::paragraph("");
        reference.set_runs(expected);
        assert_eq!(document.blocks[2].content, reference.content);
        assert_eq!(engine.user_prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_develop_blocks_uses_selection_only() {
        let (orchestrator, engine) = orchestrator(ScriptedEngine::new());
        engine.push_reply("Developed");

        let mut document = Document::new(vec![
            Block::paragraph("one").with_id("a"),
            Block::paragraph("two").with_id("b"),
            Block::paragraph("three").with_id("c"),
        ]);
        let ids = vec!["a".to_string(), "b".to_string()];
        orchestrator.develop_blocks(&mut document, &ids).await.unwrap();

        assert_eq!(engine.user_prompts()[0], prompts::develop_prompt("one\ntwo"));
        assert_eq!(document.ids()[3], "c");
        assert_eq!(block_to_string(&document.blocks[2]), "Developed");
        assert_eq!(document.blocks[2].text_color(), Some(ASSISTANT_COLOR));

        let missing = orchestrator
            .develop_blocks(&mut document, &["nope".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(missing, AssistantError::Document(_)));
    }

    #[tokio::test]
    async fn test_finished_event_after_task() {
        let (orchestrator, _engine) = orchestrator(ScriptedEngine::echoing("x"));
        let mut rx = orchestrator.subscribe();
        let mut document = Document::new(vec![Block::paragraph("idea")]);
        orchestrator.develop_document(&mut document).await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            events.last(),
            Some(&AssistantEvent::Finished {
                task: TaskKind::Develop
            })
        );
    }
}
