//! Block model
//!
//! A block is one node of an editor document, serialized the way the
//! BlockNote editor stores it:
//!
//! ```json
//! {
//!   "id": "5f0c…",
//!   "type": "heading",
//!   "props": { "level": 2, "textColor": "default" },
//!   "content": [{ "type": "text", "text": "Intro", "styles": { "bold": true } }],
//!   "children": []
//! }
//! ```
//!
//! Tables carry a `tableContent` object instead of an inline array.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Block type tags used by the editor
pub mod block_types {
    pub const PARAGRAPH: &str = "paragraph";
    pub const HEADING: &str = "heading";
    pub const BULLET_LIST_ITEM: &str = "bulletListItem";
    pub const NUMBERED_LIST_ITEM: &str = "numberedListItem";
    pub const CHECK_LIST_ITEM: &str = "checkListItem";
    pub const TABLE: &str = "table";
    pub const DIVIDER: &str = "divider";
    pub const QUOTE: &str = "quote";
    pub const IMAGE: &str = "image";
    pub const CODE_BLOCK: &str = "codeBlock";
}

/// Style map of a text run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Styles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strike: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_alignment: Option<String>,
}

impl Styles {
    pub fn is_empty(&self) -> bool {
        self == &Styles::default()
    }

    pub fn with_background(mut self, color: impl Into<String>) -> Self {
        self.background_color = Some(color.into());
        self
    }

    pub fn with_text_color(mut self, color: impl Into<String>) -> Self {
        self.text_color = Some(color.into());
        self
    }

    pub fn with_strike(mut self) -> Self {
        self.strike = Some(true);
        self
    }

    pub fn with_bold(mut self) -> Self {
        self.bold = Some(true);
        self
    }

    pub fn with_italic(mut self) -> Self {
        self.italic = Some(true);
        self
    }

    pub fn with_code(mut self) -> Self {
        self.code = Some(true);
        self
    }

    fn flag(value: Option<bool>) -> bool {
        value.unwrap_or(false)
    }

    pub fn is_bold(&self) -> bool {
        Self::flag(self.bold)
    }

    pub fn is_italic(&self) -> bool {
        Self::flag(self.italic)
    }

    pub fn is_strike(&self) -> bool {
        Self::flag(self.strike)
    }

    pub fn is_code(&self) -> bool {
        Self::flag(self.code)
    }
}

/// A text fragment plus its style map (a "run")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledText {
    pub text: String,
    #[serde(default)]
    pub styles: Styles,
}

impl StyledText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            styles: Styles::default(),
        }
    }

    pub fn styled(text: impl Into<String>, styles: Styles) -> Self {
        Self {
            text: text.into(),
            styles,
        }
    }
}

/// Inline content item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InlineContent {
    Text(StyledText),
    Link {
        href: String,
        #[serde(default)]
        content: Vec<InlineContent>,
    },
}

impl InlineContent {
    pub fn text(text: impl Into<String>) -> Self {
        InlineContent::Text(StyledText::plain(text))
    }
}

impl From<StyledText> for InlineContent {
    fn from(run: StyledText) -> Self {
        InlineContent::Text(run)
    }
}

/// One table row; each cell is a list of inline items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub cells: Vec<Vec<InlineContent>>,
}

fn table_content_tag() -> String {
    "tableContent".to_string()
}

/// Content of a table block (`"type": "tableContent"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableContent {
    /// Older documents omit the tag
    #[serde(rename = "type", default = "table_content_tag")]
    pub content_type: String,
    #[serde(default)]
    pub rows: Vec<TableRow>,
}

impl TableContent {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self {
            content_type: table_content_tag(),
            rows,
        }
    }
}

impl Default for TableContent {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Block content: inline items or a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockContent {
    Inline(Vec<InlineContent>),
    Table(TableContent),
}

/// Generate a fresh block identifier
pub fn new_block_id() -> String {
    Uuid::new_v4().to_string()
}

/// One block of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default = "new_block_id")]
    pub id: String,

    #[serde(rename = "type")]
    pub block_type: String,

    #[serde(default)]
    pub props: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<BlockContent>,

    #[serde(default)]
    pub children: Vec<Block>,
}

impl Block {
    /// Empty block of the given type with a fresh id
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            id: new_block_id(),
            block_type: block_type.into(),
            props: Map::new(),
            content: Some(BlockContent::Inline(Vec::new())),
            children: Vec::new(),
        }
    }

    /// Paragraph holding one unstyled run (no run when `text` is empty)
    pub fn paragraph(text: impl Into<String>) -> Self {
        let mut block = Self::new(block_types::PARAGRAPH);
        block.set_plain_text(text);
        block
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        let mut block = Self::new(block_types::HEADING);
        block.props.insert("level".to_string(), Value::from(level));
        block.set_plain_text(text);
        block
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.props.insert(key.to_string(), value.into());
        self
    }

    pub fn is_heading(&self) -> bool {
        self.block_type == block_types::HEADING
    }

    /// Heading level (1 when a heading carries no level prop)
    pub fn heading_level(&self) -> Option<u8> {
        if !self.is_heading() {
            return None;
        }
        let level = self
            .props
            .get("level")
            .and_then(Value::as_u64)
            .unwrap_or(1);
        Some(level.clamp(1, 6) as u8)
    }

    /// Inline items, or `None` for tables and content-less blocks
    pub fn inline(&self) -> Option<&[InlineContent]> {
        match &self.content {
            Some(BlockContent::Inline(items)) => Some(items),
            _ => None,
        }
    }

    pub fn set_inline(&mut self, items: Vec<InlineContent>) {
        self.content = Some(BlockContent::Inline(items));
    }

    pub fn set_runs(&mut self, runs: Vec<StyledText>) {
        self.set_inline(runs.into_iter().map(InlineContent::Text).collect());
    }

    pub fn set_plain_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            self.set_inline(Vec::new());
        } else {
            self.set_inline(vec![InlineContent::text(text)]);
        }
    }

    pub fn text_color(&self) -> Option<&str> {
        self.props.get("textColor").and_then(Value::as_str)
    }

    pub fn set_text_color(&mut self, color: &str) {
        self.props
            .insert("textColor".to_string(), Value::from(color));
    }

    /// Reset a placeholder color back to the editor default
    pub fn clear_text_color(&mut self) {
        self.props.remove("textColor");
    }
}
