//! Inference engine abstraction
//!
//! The orchestrator talks to every backend through [`InferenceEngine`]:
//! a system + user prompt pair goes in, a finite stream of text deltas
//! comes out. Cancellation is best-effort: [`InferenceEngine::interrupt`]
//! asks the running generation to stop, and whatever was already streamed
//! stays with the caller.

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Progress report emitted while a model is being prepared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitProgress {
    /// Fraction in `[0, 1]`
    pub progress: f64,
    /// Human-readable description of the current step
    pub text: String,
    /// Seconds since loading started
    pub time_elapsed: f64,
}

/// Callback receiving load progress
pub type ProgressCallback = Arc<dyn Fn(InitProgress) + Send + Sync>;

/// Finite, non-restartable stream of generated text deltas
pub type DeltaStream = BoxStream<'static, Result<String>>;

/// Boundary to a text-generation backend
///
/// Implementations must be `Send + Sync`; the orchestrator holds them behind
/// `Arc<dyn InferenceEngine>` and awaits every call sequentially.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Prepare the model. Called lazily before the first prompt; calling it
    /// again once loaded must be cheap.
    async fn load(&self, progress: ProgressCallback) -> Result<()>;

    /// Whether `load` has completed successfully
    fn is_loaded(&self) -> bool;

    /// Whether the model assets are already available locally
    async fn is_model_cached(&self) -> Result<bool>;

    /// Forget any conversation state kept between requests
    async fn reset_chat(&self) -> Result<()>;

    /// Start a streamed completion for the given messages
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<DeltaStream>;

    /// Request that the in-flight generation stop
    async fn interrupt(&self);

    /// Display string describing the last generation's performance
    async fn runtime_stats(&self) -> Result<String>;
}
