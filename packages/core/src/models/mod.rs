//! Data Models
//!
//! - `Block` / `Document` - editor content in BlockNote JSON form
//! - `Page` - persisted note with its place in the hierarchy
//! - `Image` - uploaded image metadata owned by a page
//! - `Settings` - single global settings record
//!
//! Wire types serialize with camelCase keys.

mod block;
mod document;
mod image;
mod page;
mod settings;

use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;

pub use block::{
    block_types, new_block_id, Block, BlockContent, InlineContent, StyledText, Styles,
    TableContent, TableRow,
};
pub use document::Document;
pub use image::{CreateImage, Image, ImageUpdate, ImageWithPage, NewImage};
pub use page::{
    parse_tags, tags_to_json, CreatePage, Page, PageSummary, PageUpdate, PageWithRelations,
    DEFAULT_PAGE_TITLE,
};
pub use settings::{AiEngineKind, Settings, SettingsUpdate, DEFAULT_LM_STUDIO_URL, SETTINGS_ID};

/// Current time at the millisecond precision timestamps are stored with
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Input validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0}")]
    MissingField(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),

    #[error("Invalid document content: {0}")]
    InvalidContent(String),
}
