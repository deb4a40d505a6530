//! AI writing assistant
//!
//! - [`prompts`] - task kinds, system prompts and prompt builders
//! - [`Orchestrator`] - single-task slot, streaming into blocks
//! - [`AssistantEvent`] - progress published to subscribers
//! - [`TaskRequest`] - running a task against a stored page

mod error;
mod events;
mod orchestrator;
mod page_task;
pub mod prompts;
mod summary;

pub use error::AssistantError;
pub use events::{AssistantEvent, DocumentSide};
pub use orchestrator::{AssistantStatus, Orchestrator, TaskGuard, EVENT_CAPACITY};
pub use page_task::{TaskOutcome, TaskRequest};
pub use prompts::{check_input_length, TaskKind, MAX_INPUT_CHARS};
