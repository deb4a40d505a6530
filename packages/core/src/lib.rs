//! NotesAI Core
//!
//! Notes are pages holding block documents in the editor's JSON form. This
//! crate owns everything below the HTTP layer.
//!
//! # Modules
//!
//! - [`models`] - blocks, documents, pages, images, settings
//! - [`diff`] - annotating AI corrections against the original text
//! - [`text`] - plain-text extraction for search and prompts
//! - [`markdown`] - block/markdown conversion for prompts and responses
//! - [`hierarchy`] - sidebar tree, breadcrumbs and reorder planning
//! - [`db`] - libsql persistence with an FTS5 search index
//! - [`services`] - `PageService`, the business rules over a store
//! - [`assistant`] - the AI task orchestrator

pub mod assistant;
pub mod db;
pub mod diff;
pub mod hierarchy;
pub mod markdown;
pub mod models;
pub mod services;
pub mod text;

// Re-export commonly used types
pub use assistant::{
    AssistantError, AssistantEvent, AssistantStatus, Orchestrator, TaskKind, TaskOutcome,
    TaskRequest,
};
pub use db::{DatabaseError, DatabaseService, LibsqlStore, MemoryStore, PageStore};
pub use diff::DiffMode;
pub use hierarchy::{DropPosition, MoveRequest, PageNode};
pub use models::*;
pub use services::{PageService, PageServiceError, SearchHit};
