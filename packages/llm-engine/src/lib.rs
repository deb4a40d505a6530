/// NotesAI LLM Engine - inference boundary for the AI task orchestrator
///
/// This crate defines how the orchestrator talks to a text-generation
/// backend and ships two implementations:
///
/// - **OpenAiEngine**: streaming chat completions against any
///   OpenAI-compatible server (LM Studio by default)
/// - **ScriptedEngine**: deterministic replies for tests and offline runs
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
/// use notesai_llm_engine::{ChatMessage, EngineConfig, InferenceEngine, OpenAiEngine};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = OpenAiEngine::new(EngineConfig::default())?;
///     engine.load(Arc::new(|report| println!("{}", report.text))).await?;
///
///     let mut deltas = engine
///         .stream_chat(vec![
///             ChatMessage::system("You are a professional translator."),
///             ChatMessage::user("Bonjour le monde"),
///         ])
///         .await?;
///     while let Some(delta) = deltas.next().await {
///         print!("{}", delta?);
///     }
///     Ok(())
/// }
/// ```
pub mod config;
pub mod engine;
pub mod error;
pub mod openai;
pub mod scripted;
pub mod sse;

// Re-export main types
pub use config::{EngineConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use engine::{
    ChatMessage, DeltaStream, InferenceEngine, InitProgress, ProgressCallback, Role,
};
pub use error::{EngineError, Result};
pub use openai::{GenerationStats, OpenAiEngine};
pub use scripted::ScriptedEngine;
