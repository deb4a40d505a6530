//! Document Model
//!
//! An ordered, possibly nested list of [`Block`]s. Serialized as a bare JSON
//! array, exactly what the editor stores in `Page.content`.
//!
//! Block ids are unique within a document; every block inserted through
//! these methods gets a fresh UUID.

use super::block::{new_block_id, Block};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Content of a freshly created page: one empty paragraph
    pub fn new_page() -> Self {
        Self::new(vec![Block::paragraph("")])
    }

    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse, treating malformed content as an empty document
    pub fn parse_lossy(json: &str) -> Self {
        match Self::parse(json) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Ignoring malformed document content: {}", e);
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.blocks).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Find a block anywhere in the tree
    pub fn find(&self, id: &str) -> Option<&Block> {
        find_in(&self.blocks, id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Block> {
        find_in_mut(&mut self.blocks, id)
    }

    /// Sibling list holding `id` and the block's index in it
    fn locate_mut(&mut self, id: &str) -> Option<(&mut Vec<Block>, usize)> {
        locate_in(&mut self.blocks, id)
    }

    /// Insert blocks right after `reference`; returns the inserted ids
    pub fn insert_after(&mut self, reference: &str, blocks: Vec<Block>) -> Option<Vec<String>> {
        let (siblings, idx) = self.locate_mut(reference)?;
        let blocks = with_fresh_ids(blocks);
        let ids = blocks.iter().map(|b| b.id.clone()).collect();
        siblings.splice(idx + 1..idx + 1, blocks);
        Some(ids)
    }

    /// Insert blocks right before `reference`; returns the inserted ids
    pub fn insert_before(&mut self, reference: &str, blocks: Vec<Block>) -> Option<Vec<String>> {
        let (siblings, idx) = self.locate_mut(reference)?;
        let blocks = with_fresh_ids(blocks);
        let ids = blocks.iter().map(|b| b.id.clone()).collect();
        siblings.splice(idx..idx, blocks);
        Some(ids)
    }

    /// Append blocks at the end of the top level; returns the inserted ids
    pub fn push(&mut self, blocks: Vec<Block>) -> Vec<String> {
        let blocks = with_fresh_ids(blocks);
        let ids = blocks.iter().map(|b| b.id.clone()).collect();
        self.blocks.extend(blocks);
        ids
    }

    /// Replace one block with zero or more blocks
    pub fn replace(&mut self, id: &str, blocks: Vec<Block>) -> Option<Vec<String>> {
        let (siblings, idx) = self.locate_mut(id)?;
        let blocks = with_fresh_ids(blocks);
        let ids = blocks.iter().map(|b| b.id.clone()).collect();
        siblings.splice(idx..=idx, blocks);
        Some(ids)
    }

    pub fn remove(&mut self, id: &str) -> Option<Block> {
        let (siblings, idx) = self.locate_mut(id)?;
        Some(siblings.remove(idx))
    }

    /// Hoist nested children to the top level, depth-first, parent first
    pub fn flatten(&mut self) {
        fn walk(blocks: Vec<Block>, out: &mut Vec<Block>) {
            for mut block in blocks {
                let children = std::mem::take(&mut block.children);
                out.push(block);
                walk(children, out);
            }
        }

        let mut flat = Vec::with_capacity(self.blocks.len());
        walk(std::mem::take(&mut self.blocks), &mut flat);
        self.blocks = flat;
    }

    /// Top-level ids in order
    pub fn ids(&self) -> Vec<String> {
        self.blocks.iter().map(|b| b.id.clone()).collect()
    }

    /// Replay the changes that turned `base` into `edited` onto `self`
    ///
    /// `self` is a newer revision of `base`. Blocks are matched by id and
    /// compared without their children, so flattening in `edited` is not a
    /// change. Changed blocks overwrite their counterpart (unless it was
    /// deleted in `self`), new blocks keep their ids and land after the
    /// nearest preceding block of `edited` that `self` still has, and blocks
    /// dropped from `edited` are removed. Anything else in `self` is kept.
    pub fn merge_edits(&mut self, base: &Document, edited: &Document) {
        let mut anchor: Option<String> = None;
        for block in preorder(&edited.blocks) {
            match base.find(&block.id) {
                Some(before) => {
                    if !same_own_content(before, block) {
                        if let Some(target) = self.find_mut(&block.id) {
                            target.block_type = block.block_type.clone();
                            target.props = block.props.clone();
                            target.content = block.content.clone();
                        }
                    }
                }
                None if self.find(&block.id).is_some() => {}
                None => {
                    let mut inserted = block.clone();
                    inserted.children.retain(|child| base.find(&child.id).is_none());
                    match anchor.as_deref().and_then(|id| self.locate_mut(id)) {
                        Some((siblings, idx)) => siblings.insert(idx + 1, inserted),
                        None => self.blocks.insert(0, inserted),
                    }
                }
            }
            if self.find(&block.id).is_some() {
                anchor = Some(block.id.clone());
            }
        }

        for removed in preorder(&base.blocks) {
            if edited.find(&removed.id).is_none() {
                self.remove(&removed.id);
            }
        }
    }
}

/// Depth-first, parent before children
fn preorder(blocks: &[Block]) -> Vec<&Block> {
    let mut out = Vec::new();
    let mut stack: Vec<&Block> = blocks.iter().rev().collect();
    while let Some(block) = stack.pop() {
        out.push(block);
        stack.extend(block.children.iter().rev());
    }
    out
}

fn same_own_content(a: &Block, b: &Block) -> bool {
    a.block_type == b.block_type && a.props == b.props && a.content == b.content
}

impl From<Vec<Block>> for Document {
    fn from(blocks: Vec<Block>) -> Self {
        Self::new(blocks)
    }
}

/// Give a block and all its descendants new ids
fn refresh_ids(block: &mut Block) {
    block.id = new_block_id();
    for child in &mut block.children {
        refresh_ids(child);
    }
}

fn with_fresh_ids(mut blocks: Vec<Block>) -> Vec<Block> {
    for block in &mut blocks {
        refresh_ids(block);
    }
    blocks
}

fn find_in<'a>(blocks: &'a [Block], id: &str) -> Option<&'a Block> {
    blocks.iter().find_map(|block| {
        if block.id == id {
            Some(block)
        } else {
            find_in(&block.children, id)
        }
    })
}

fn find_in_mut<'a>(blocks: &'a mut [Block], id: &str) -> Option<&'a mut Block> {
    blocks.iter_mut().find_map(|block| {
        if block.id == id {
            Some(block)
        } else {
            find_in_mut(&mut block.children, id)
        }
    })
}

fn locate_in<'a>(blocks: &'a mut Vec<Block>, id: &str) -> Option<(&'a mut Vec<Block>, usize)> {
    if let Some(idx) = blocks.iter().position(|b| b.id == id) {
        return Some((blocks, idx));
    }
    blocks
        .iter_mut()
        .find_map(|block| locate_in(&mut block.children, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::block::block_types;

    fn sample() -> Document {
        let mut parent = Block::paragraph("parent").with_id("a");
        parent.children.push(Block::paragraph("child").with_id("a1"));
        Document::new(vec![parent, Block::heading(2, "Title").with_id("b")])
    }

    #[test]
    fn test_parse_lossy_on_garbage() {
        assert!(Document::parse_lossy("{not json").is_empty());
        assert!(Document::parse_lossy("[]").is_empty());
    }

    #[test]
    fn test_new_page_is_single_empty_paragraph() {
        let doc = Document::new_page();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.blocks[0].block_type, block_types::PARAGRAPH);
        assert_eq!(doc.blocks[0].inline().map(|i| i.len()), Some(0));
    }

    #[test]
    fn test_find_nested_block() {
        let mut doc = sample();
        assert!(doc.find("a1").is_some());
        doc.find_mut("a1").unwrap().set_text_color("red");
        assert_eq!(doc.find("a1").unwrap().text_color(), Some("red"));
        assert!(doc.find("zzz").is_none());
    }

    #[test]
    fn test_insert_and_replace_use_fresh_ids() {
        let mut doc = sample();
        let inserted = doc
            .insert_after("a1", vec![Block::paragraph("x").with_id("a")])
            .unwrap();
        assert_eq!(inserted.len(), 1);
        assert_ne!(inserted[0], "a", "duplicate ids must not be inserted");
        assert_eq!(doc.blocks[0].children[1].id, inserted[0]);

        let before = doc.insert_before("b", vec![Block::paragraph("y")]).unwrap();
        assert_eq!(doc.blocks[1].id, before[0]);

        let replaced = doc
            .replace("b", vec![Block::paragraph("1"), Block::paragraph("2")])
            .unwrap();
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.ids()[2..], replaced[..]);
    }

    #[test]
    fn test_flatten_keeps_depth_first_order() {
        let mut doc = sample();
        doc.flatten();
        assert_eq!(doc.ids(), vec!["a", "a1", "b"]);
        assert!(doc.blocks.iter().all(|b| b.children.is_empty()));
    }

    #[test]
    fn test_remove() {
        let mut doc = sample();
        assert_eq!(doc.remove("a1").map(|b| b.id), Some("a1".to_string()));
        assert!(doc.blocks[0].children.is_empty());
        assert!(doc.remove("a1").is_none());
    }

    #[test]
    fn test_merge_edits_keeps_concurrent_changes() {
        let base = sample();

        // Task output: "b" rewritten, a new block after it, "a1" dropped
        let mut edited = base.clone();
        edited.find_mut("b").unwrap().content = Block::paragraph("Rewritten").content;
        edited.blocks.push(Block::paragraph("Generated").with_id("gen"));
        edited.remove("a1");

        // Meanwhile the user appended a block of their own
        let mut latest = base.clone();
        latest.blocks.push(Block::paragraph("User edit").with_id("user"));

        latest.merge_edits(&base, &edited);

        assert_eq!(latest.ids(), vec!["a", "b", "gen", "user"]);
        assert!(latest.find("a1").is_none());
        assert_eq!(latest.find("b").unwrap().content, Block::paragraph("Rewritten").content);
    }

    #[test]
    fn test_merge_edits_skips_blocks_the_user_deleted() {
        let base = sample();
        let mut edited = base.clone();
        edited.find_mut("b").unwrap().content = Block::paragraph("Rewritten").content;

        let mut latest = base.clone();
        latest.remove("b");
        latest.merge_edits(&base, &edited);

        assert_eq!(latest.ids(), vec!["a"]);
        assert_eq!(latest.find("a1").map(|b| b.id.as_str()), Some("a1"));
    }

    #[test]
    fn test_merge_edits_ignores_flattening() {
        let base = sample();
        let mut edited = base.clone();
        edited.flatten();

        let mut latest = base.clone();
        latest.merge_edits(&base, &edited);
        assert_eq!(latest, base);
    }
}
