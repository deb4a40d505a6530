//! Assistant progress events
//!
//! Published on a `tokio::sync::broadcast` channel. The HTTP layer forwards
//! them as server-sent events; the serialized `type` tag becomes the SSE
//! event name.

use super::prompts::TaskKind;
use crate::models::Block;
use serde::Serialize;

/// Which document an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSide {
    /// The page being worked on
    Source,
    /// The side-by-side result of a translation or correction
    Output,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AssistantEvent {
    /// Status line; empty once a task is over
    Status {
        task: Option<TaskKind>,
        message: String,
    },

    /// Model load progress
    #[serde(rename_all = "camelCase")]
    Loading {
        progress: f64,
        text: String,
        time_elapsed: f64,
        /// Whether the weights were already on disk before this load
        model_cached: Option<bool>,
    },

    /// One block changed in place
    BlockUpdated { side: DocumentSide, block: Block },

    /// New blocks placed after `after_id`, or at the very top without one
    #[serde(rename_all = "camelCase")]
    BlocksInserted {
        side: DocumentSide,
        after_id: Option<String>,
        blocks: Vec<Block>,
    },

    /// `replaced_id` was swapped for `blocks`; without an id the whole
    /// document was replaced
    #[serde(rename_all = "camelCase")]
    BlocksReplaced {
        side: DocumentSide,
        replaced_id: Option<String>,
        blocks: Vec<Block>,
    },

    Error { message: String },

    /// Runtime statistics of the last generation
    Stats { text: String },

    Finished { task: TaskKind },
}

impl AssistantEvent {
    /// Name used for the SSE `event:` field
    pub fn name(&self) -> &'static str {
        match self {
            AssistantEvent::Status { .. } => "status",
            AssistantEvent::Loading { .. } => "loading",
            AssistantEvent::BlockUpdated { .. } => "blockUpdated",
            AssistantEvent::BlocksInserted { .. } => "blocksInserted",
            AssistantEvent::BlocksReplaced { .. } => "blocksReplaced",
            AssistantEvent::Error { .. } => "error",
            AssistantEvent::Stats { .. } => "stats",
            AssistantEvent::Finished { .. } => "finished",
        }
    }
}
