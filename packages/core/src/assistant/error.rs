//! Assistant error types

use super::prompts::TaskKind;
use crate::services::PageServiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistantError {
    /// Another task holds the slot
    #[error("Assistant is busy with {current}")]
    Busy { current: TaskKind },

    /// The engine could not be loaded; the whole operation is abandoned
    #[error("{0}")]
    EngineLoad(String),

    #[error("Prompt exceeds the input budget")]
    InputTooLong,

    #[error("Generation failed: {0}")]
    Generation(String),

    /// The request does not fit the page (unknown block, nothing selected)
    #[error("Invalid document request: {0}")]
    Document(String),

    #[error(transparent)]
    Pages(#[from] PageServiceError),
}

impl AssistantError {
    pub fn engine_load(cause: impl std::fmt::Display) -> Self {
        Self::EngineLoad(format!("Could not load the model because {}", cause))
    }

    pub fn document(msg: impl Into<String>) -> Self {
        Self::Document(msg.into())
    }
}
