//! Plain-text views of documents
//!
//! - [`extract_searchable_text`] flattens stored content for the page's
//!   `searchableText` column
//! - [`extract_indexable_text`] is the broader variant, which also picks up
//!   block types and string props; `notesai-reindex --indexable` stores it
//!   through [`IndexMode::Indexable`]
//! - [`block_to_string`] is the prompt text of one block
//! - [`search_snippet`] cuts the excerpt shown under a search hit, with
//!   [`highlight_search_term`] marking the query in it
//!
//! Extraction walks JSON values rather than typed blocks so content written
//! by older editor versions is still indexed. Malformed content yields an
//! empty string.

use crate::models::{Block, BlockContent, InlineContent};
use regex::Regex;
use serde_json::{Map, Value};

/// Keys already handled explicitly when walking an inline item
const INLINE_HANDLED_KEYS: [&str; 5] = ["type", "text", "url", "href", "content"];

fn parse_blocks(content: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(blocks)) => Some(blocks),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Content is not valid JSON, indexing as empty: {}", e);
            None
        }
    }
}

fn push_str(parts: &mut Vec<String>, value: Option<&Value>) {
    if let Some(Value::String(s)) = value {
        if !s.is_empty() {
            parts.push(s.clone());
        }
    }
}

fn collect_inline(items: &[Value], parts: &mut Vec<String>) {
    for item in items {
        match item {
            Value::String(s) => parts.push(s.clone()),
            Value::Object(obj) => {
                push_str(parts, obj.get("text"));
                push_str(parts, obj.get("url"));
                push_str(parts, obj.get("href"));
                for (key, value) in obj {
                    if INLINE_HANDLED_KEYS.contains(&key.as_str()) {
                        continue;
                    }
                    if let Value::String(s) = value {
                        parts.push(s.clone());
                    }
                }
                if let Some(Value::Array(nested)) = obj.get("content") {
                    collect_inline(nested, parts);
                }
            }
            _ => {}
        }
    }
}

fn collect_client(block: &Map<String, Value>, parts: &mut Vec<String>) {
    if let Some(Value::Array(items)) = block.get("content") {
        collect_inline(items, parts);
    }
    if let Some(Value::Array(children)) = block.get("children") {
        for child in children {
            if let Value::Object(child) = child {
                collect_client(child, parts);
            }
        }
    }
}

/// Searchable text of serialized content, joined with single spaces
pub fn extract_searchable_text(content: &str) -> String {
    let Some(blocks) = parse_blocks(content) else {
        return String::new();
    };

    let mut parts = Vec::new();
    for block in &blocks {
        if let Value::Object(block) = block {
            collect_client(block, &mut parts);
        }
    }
    parts.join(" ").trim().to_string()
}

fn collect_indexable(block: &Map<String, Value>, parts: &mut Vec<String>) {
    if let Some(Value::String(block_type)) = block.get("type") {
        parts.push(block_type.clone());
    }

    if let Some(Value::Array(items)) = block.get("content") {
        for item in items {
            match item {
                Value::String(s) => parts.push(s.clone()),
                Value::Object(obj) => {
                    parts.extend(obj.values().filter_map(Value::as_str).map(str::to_string))
                }
                _ => {}
            }
        }
    }

    for (key, value) in block {
        if key == "type" {
            continue;
        }
        match value {
            Value::String(s) => parts.push(s.clone()),
            Value::Array(values) => {
                parts.extend(values.iter().filter_map(Value::as_str).map(str::to_string))
            }
            _ => {}
        }
    }

    if let Some(Value::Array(children)) = block.get("children") {
        for child in children {
            if let Value::Object(child) = child {
                collect_indexable(child, parts);
            }
        }
    }
}

/// Server-side indexing text: block types, inline strings and every other
/// string-valued block field, depth-first
pub fn extract_indexable_text(content: &str) -> String {
    let Some(blocks) = parse_blocks(content) else {
        return String::new();
    };

    let mut parts = Vec::new();
    for block in &blocks {
        if let Value::Object(block) = block {
            collect_indexable(block, &mut parts);
        }
    }
    parts.join(" ").trim().to_string()
}

/// Value stored in `pages.searchable_text`
pub fn searchable_text_for(title: &str, content: &str) -> String {
    IndexMode::Searchable.text_for(title, content)
}

/// Which extractor fills `pages.searchable_text`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexMode {
    /// Text as the editor shows it; used on every page write
    #[default]
    Searchable,
    /// Also block types and string props, so `heading` or a link target
    /// is searchable
    Indexable,
}

impl IndexMode {
    pub fn text_for(self, title: &str, content: &str) -> String {
        let body = match self {
            IndexMode::Searchable => extract_searchable_text(content),
            IndexMode::Indexable => extract_indexable_text(content),
        };
        format!("{} {}", title, body).trim().to_string()
    }
}

fn inline_text(items: &[InlineContent], out: &mut String) {
    for item in items {
        match item {
            InlineContent::Text(run) => out.push_str(&run.text),
            InlineContent::Link { content, .. } => inline_text(content, out),
        }
    }
}

/// Plain text of a block's own content (children excluded)
///
/// Table cells contribute a leading space each; only direct text items of a
/// cell are read.
pub fn block_to_string(block: &Block) -> String {
    let mut out = String::new();
    match &block.content {
        Some(BlockContent::Inline(items)) => inline_text(items, &mut out),
        Some(BlockContent::Table(table)) => {
            for cell in table.rows.iter().flat_map(|row| row.cells.iter()) {
                if cell.is_empty() {
                    continue;
                }
                out.push(' ');
                for item in cell {
                    if let InlineContent::Text(run) = item {
                        out.push_str(&run.text);
                    }
                }
            }
        }
        None => {}
    }
    out
}

/// Wrap every case-insensitive occurrence of `term` in `<mark>` tags
pub fn highlight_search_term(text: &str, term: &str) -> String {
    if text.is_empty() || term.is_empty() {
        return text.to_string();
    }

    match Regex::new(&format!("(?i)({})", regex::escape(term))) {
        Ok(pattern) => pattern.replace_all(text, "<mark>${1}</mark>").into_owned(),
        Err(e) => {
            tracing::warn!("Could not build highlight pattern for '{}': {}", term, e);
            text.to_string()
        }
    }
}

/// Characters of context kept on each side of the first hit
const SNIPPET_CONTEXT: usize = 60;

/// Excerpt of `text` around the first case-insensitive hit of `term`,
/// with every hit inside it highlighted
///
/// Falls back to the start of the text when the term only matched through
/// the index tokenizer (punctuation, title-only hits).
pub fn search_snippet(text: &str, term: &str) -> String {
    let hit = Regex::new(&format!("(?i){}", regex::escape(term)))
        .ok()
        .filter(|_| !term.is_empty())
        .and_then(|pattern| pattern.find(text).map(|m| (m.start(), m.end())));
    let (start, end) = hit.unwrap_or((0, 0));

    let from = text[..start]
        .char_indices()
        .rev()
        .nth(SNIPPET_CONTEXT - 1)
        .map_or(0, |(i, _)| i);
    let to = text[end..]
        .char_indices()
        .nth(SNIPPET_CONTEXT)
        .map_or(text.len(), |(i, _)| end + i);

    let mut snippet = String::new();
    if from > 0 {
        snippet.push('\u{2026}');
    }
    snippet.push_str(&highlight_search_term(&text[from..to], term));
    if to < text.len() {
        snippet.push('\u{2026}');
    }
    snippet
}
