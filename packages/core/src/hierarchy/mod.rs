//! Page Hierarchy
//!
//! Pure functions over flat page lists:
//!
//! - [`organize_hierarchy`] builds the sidebar forest
//! - [`breadcrumbs`] / [`descendant_ids`] walk the parent links; the
//!   latter reports what a page delete detaches
//! - [`plan_move`] computes the order shifts for a drag-and-drop move
//!
//! Persistence applies a [`ReorderPlan`] atomically; nothing here touches
//! storage.

use crate::models::PageSummary;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// A page with its nested children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageNode {
    #[serde(flatten)]
    pub page: PageSummary,
    pub children: Vec<PageNode>,
}

impl PageNode {
    /// Number of pages in this subtree, including itself
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(PageNode::count).sum::<usize>()
    }
}

/// Build a forest from a flat page list
///
/// Pages without a parent, or whose parent is not in the list, become
/// roots. Children keep their input order. Pages stuck in a parent cycle
/// are promoted to roots as well, so every input page appears exactly once.
pub fn organize_hierarchy(pages: Vec<PageSummary>) -> Vec<PageNode> {
    let index: HashMap<&str, usize> = pages
        .iter()
        .enumerate()
        .map(|(i, page)| (page.id.as_str(), i))
        .collect();

    let parents: Vec<Option<usize>> = pages
        .iter()
        .map(|page| {
            page.parent_id
                .as_deref()
                .and_then(|parent| index.get(parent).copied())
        })
        .collect();
    drop(index);

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); pages.len()];
    for (i, parent) in parents.iter().enumerate() {
        if let Some(parent) = parent {
            children[*parent].push(i);
        }
    }

    let mut slots: Vec<Option<PageSummary>> = pages.into_iter().map(Some).collect();
    let mut visited = vec![false; slots.len()];
    let mut forest = Vec::new();

    for i in 0..slots.len() {
        if parents[i].is_none() {
            forest.extend(build_node(i, &children, &mut slots, &mut visited));
        }
    }

    for i in 0..slots.len() {
        if !visited[i] {
            tracing::warn!("Page in a parent cycle promoted to root");
            forest.extend(build_node(i, &children, &mut slots, &mut visited));
        }
    }

    forest
}

fn build_node(
    i: usize,
    children: &[Vec<usize>],
    slots: &mut [Option<PageSummary>],
    visited: &mut [bool],
) -> Option<PageNode> {
    visited[i] = true;
    let mut nodes = Vec::new();
    for &child in &children[i] {
        if !visited[child] {
            nodes.extend(build_node(child, children, slots, visited));
        }
    }

    slots[i].take().map(|page| PageNode {
        page,
        children: nodes,
    })
}

/// Root-first ancestor chain ending with the page itself
///
/// Stops at a dangling parent or when a cycle is detected. Empty when the
/// page is unknown.
pub fn breadcrumbs(pages: &[PageSummary], id: &str) -> Vec<PageSummary> {
    let by_id: HashMap<&str, &PageSummary> = pages.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = by_id.get(id).copied();
    while let Some(page) = current {
        if !seen.insert(page.id.as_str()) {
            break;
        }
        chain.push(page.clone());
        current = page
            .parent_id
            .as_deref()
            .and_then(|parent| by_id.get(parent).copied());
    }
    chain.reverse();
    chain
}

/// Ids of every page below `id`, breadth-first
pub fn descendant_ids(pages: &[PageSummary], id: &str) -> Vec<String> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for page in pages {
        if let Some(parent) = page.parent_id.as_deref() {
            children.entry(parent).or_default().push(page.id.as_str());
        }
    }

    let mut out = Vec::new();
    let mut seen: HashSet<&str> = HashSet::from([id]);
    let mut queue = VecDeque::from([id]);
    while let Some(current) = queue.pop_front() {
        for &child in children.get(current).map(Vec::as_slice).unwrap_or_default() {
            if seen.insert(child) {
                out.push(child.to_string());
                queue.push_back(child);
            }
        }
    }
    out
}

/// Where a dragged page was released relative to the target row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPosition {
    /// Upper 30%: insert before the target
    Top,
    /// Middle 40%: become the target's first child
    Middle,
    /// Lower 30%: insert after the target
    Bottom,
}

impl DropPosition {
    pub fn from_offset(offset: f64, height: f64) -> Self {
        if offset < height * 0.3 {
            DropPosition::Top
        } else if offset > height * 0.7 {
            DropPosition::Bottom
        } else {
            DropPosition::Middle
        }
    }
}

/// Target position of a move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub page_id: String,
    pub new_order: i64,
    pub new_parent_id: Option<String>,
}

impl MoveRequest {
    /// Interpret a drop; `None` when a page is dropped on itself
    pub fn from_drop(moved_id: &str, target: &PageSummary, position: DropPosition) -> Option<Self> {
        if moved_id == target.id {
            return None;
        }

        let (new_order, new_parent_id) = match position {
            DropPosition::Top => (target.order, target.parent_id.clone()),
            DropPosition::Bottom => (target.order + 1, target.parent_id.clone()),
            DropPosition::Middle => (0, Some(target.id.clone())),
        };

        Some(Self {
            page_id: moved_id.to_string(),
            new_order,
            new_parent_id,
        })
    }
}

/// The fields a move reads and writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEntry {
    pub id: String,
    pub parent_id: Option<String>,
    pub order: i64,
}

impl From<&PageSummary> for OrderEntry {
    fn from(page: &PageSummary) -> Self {
        Self {
            id: page.id.clone(),
            parent_id: page.parent_id.clone(),
            order: page.order,
        }
    }
}

/// New order for one sibling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub id: String,
    pub order: i64,
}

/// Everything a move writes, in application order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan {
    pub sibling_updates: Vec<OrderUpdate>,
    pub page_id: String,
    pub new_parent_id: Option<String>,
    pub new_order: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Parent page not found: {0}")]
    ParentNotFound(String),

    #[error("Cannot move page {page_id} under itself or its descendant {parent_id}")]
    IntoOwnSubtree { page_id: String, parent_id: String },
}

/// Compute the three-phase order adjustment for a move
///
/// 1. siblings under the old parent after the old position shift up by one
/// 2. siblings under the new parent at or after the new position shift down
///    by one
/// 3. the page takes its new parent and order
///
/// Both shifts are computed from `snapshot`, because drop targets carry
/// snapshot orders; a sibling hit by both phases ends at `order + 1`.
pub fn plan_move(snapshot: &[OrderEntry], request: &MoveRequest) -> Result<ReorderPlan, PlanError> {
    let moved = snapshot
        .iter()
        .find(|entry| entry.id == request.page_id)
        .ok_or_else(|| PlanError::PageNotFound(request.page_id.clone()))?;

    if let Some(parent) = request.new_parent_id.as_deref() {
        if !snapshot.iter().any(|entry| entry.id == parent) {
            return Err(PlanError::ParentNotFound(parent.to_string()));
        }

        let mut ancestor = Some(parent);
        let mut hops = 0;
        while let Some(current) = ancestor {
            if current == moved.id {
                return Err(PlanError::IntoOwnSubtree {
                    page_id: moved.id.clone(),
                    parent_id: parent.to_string(),
                });
            }
            hops += 1;
            if hops > snapshot.len() {
                break;
            }
            ancestor = snapshot
                .iter()
                .find(|entry| entry.id == current)
                .and_then(|entry| entry.parent_id.as_deref());
        }
    }

    let mut updates: Vec<OrderUpdate> = Vec::new();
    let mut set = |id: &str, order: i64| match updates.iter_mut().find(|u| u.id == id) {
        Some(existing) => existing.order = order,
        None => updates.push(OrderUpdate {
            id: id.to_string(),
            order,
        }),
    };

    for entry in snapshot {
        if entry.id != moved.id && entry.parent_id == moved.parent_id && entry.order > moved.order {
            set(&entry.id, entry.order - 1);
        }
    }
    for entry in snapshot {
        if entry.id != moved.id
            && entry.parent_id == request.new_parent_id
            && entry.order >= request.new_order
        {
            set(&entry.id, entry.order + 1);
        }
    }

    Ok(ReorderPlan {
        sibling_updates: updates,
        page_id: moved.id.clone(),
        new_parent_id: request.new_parent_id.clone(),
        new_order: request.new_order,
    })
}

impl ReorderPlan {
    /// Apply onto an in-memory snapshot
    pub fn apply(&self, entries: &mut [OrderEntry]) {
        for update in &self.sibling_updates {
            if let Some(entry) = entries.iter_mut().find(|e| e.id == update.id) {
                entry.order = update.order;
            }
        }
        if let Some(entry) = entries.iter_mut().find(|e| e.id == self.page_id) {
            entry.order = self.new_order;
            entry.parent_id = self.new_parent_id.clone();
        }
    }
}
