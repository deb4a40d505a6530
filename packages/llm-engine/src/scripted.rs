//! Deterministic in-process engine
//!
//! Replays queued responses as word-sized deltas. Useful for tests and for
//! running the orchestrator without an inference server.

use crate::engine::{ChatMessage, DeltaStream, InferenceEngine, InitProgress, ProgressCallback};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// One queued reply
#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

#[derive(Debug, Default)]
struct ScriptState {
    replies: VecDeque<Reply>,
    prompts: Vec<Vec<ChatMessage>>,
    load_error: Option<String>,
}

/// Engine that answers from a script instead of a model
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    state: Mutex<ScriptState>,
    loaded: AtomicBool,
    load_calls: AtomicUsize,
    interrupted: Arc<AtomicBool>,
    /// Weights missing until the first successful load
    uncached: AtomicBool,
    /// Reply used once the queue is empty
    fallback_reply: Option<String>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that answers every prompt with the same text once the queue is empty
    pub fn echoing(reply: impl Into<String>) -> Self {
        Self {
            fallback_reply: Some(reply.into()),
            ..Self::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a successful reply
    pub fn push_reply(&self, text: impl Into<String>) -> &Self {
        self.state().replies.push_back(Reply::Text(text.into()));
        self
    }

    /// Queue a reply that fails before producing any delta
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.state().replies.push_back(Reply::Fail(message.into()));
        self
    }

    /// Make the next `load` call fail
    pub fn fail_load(&self, message: impl Into<String>) -> &Self {
        self.state().load_error = Some(message.into());
        self
    }

    /// Report the model as not downloaded until `load` succeeds
    pub fn uncached(&self) -> &Self {
        self.uncached.store(true, Ordering::SeqCst);
        self
    }

    /// Every message list received by `stream_chat`, in order
    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.state().prompts.clone()
    }

    /// User prompt texts received, in order
    pub fn user_prompts(&self) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter_map(|messages| messages.into_iter().last().map(|m| m.content))
            .collect()
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }
}

/// Split into deltas that keep their leading whitespace, like tokenizer output
fn split_deltas(text: &str) -> Vec<String> {
    let mut deltas = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_whitespace() && !current.trim().is_empty() {
            deltas.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        deltas.push(current);
    }
    deltas
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    async fn load(&self, progress: ProgressCallback) -> Result<()> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.loaded.load(Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(message) = self.state().load_error.take() {
            return Err(EngineError::load_failed(message));
        }

        progress(InitProgress {
            progress: 1.0,
            text: "Scripted engine ready".to_string(),
            time_elapsed: 0.0,
        });
        self.loaded.store(true, Ordering::SeqCst);
        self.uncached.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn is_model_cached(&self) -> Result<bool> {
        Ok(!self.uncached.load(Ordering::SeqCst))
    }

    async fn reset_chat(&self) -> Result<()> {
        Ok(())
    }

    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<DeltaStream> {
        if !self.is_loaded() {
            return Err(EngineError::NotLoaded);
        }
        self.interrupted.store(false, Ordering::SeqCst);

        let reply = {
            let mut state = self.state();
            state.prompts.push(messages);
            state.replies.pop_front()
        };

        let text = match reply {
            Some(Reply::Text(text)) => text,
            Some(Reply::Fail(message)) => return Err(EngineError::inference(message)),
            None => match &self.fallback_reply {
                Some(text) => text.clone(),
                None => return Err(EngineError::inference("script exhausted")),
            },
        };

        let interrupted = self.interrupted.clone();
        let deltas = split_deltas(&text);
        let stream = async_stream::stream! {
            for delta in deltas {
                if interrupted.load(Ordering::SeqCst) {
                    break;
                }
                yield Ok::<String, EngineError>(delta);
                tokio::task::yield_now().await;
            }
        };

        Ok(Box::pin(stream))
    }

    async fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    async fn runtime_stats(&self) -> Result<String> {
        Ok("prefill: n/a, decoding: n/a".to_string())
    }
}
