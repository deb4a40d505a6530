//! Page Models
//!
//! A page is one persisted note: a title, a serialized [`Document`], and a
//! place in the parent/child hierarchy.
//!
//! Sibling order is an integer; among pages sharing a parent (including the
//! root) order values only sequence siblings relative to each other, so
//! gaps are tolerated.
//!
//! [`Document`]: super::Document

use super::image::Image;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_PAGE_TITLE: &str = "Untitled Page";

/// A persisted page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub title: String,
    /// Serialized document (BlockNote JSON array)
    pub content: String,
    pub parent_id: Option<String>,
    pub order: i64,
    pub is_favorite: bool,
    pub tags: Vec<String>,
    pub searchable_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn summary(&self) -> PageSummary {
        PageSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            parent_id: self.parent_id.clone(),
            order: self.order,
            is_favorite: self.is_favorite,
            tags: self.tags.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Page without its content, used by the sidebar and search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub id: String,
    pub title: String,
    pub parent_id: Option<String>,
    pub order: i64,
    pub is_favorite: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Page> for PageSummary {
    fn from(page: Page) -> Self {
        page.summary()
    }
}

/// Page plus its images and direct children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWithRelations {
    #[serde(flatten)]
    pub page: Page,
    pub images: Vec<Image>,
    pub children: Vec<PageSummary>,
}

/// Input for creating a page; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePage {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub searchable_text: Option<String>,
}

impl CreatePage {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn under(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn at(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }
}

/// Partial update for a page
///
/// Nullable columns use the double-Option pattern:
/// - `None`: leave unchanged
/// - `Some(None)`: set to NULL
/// - `Some(Some(v))`: set to `v`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub parent_id: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub searchable_text: Option<Option<String>>,
}

impl PageUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_parent(mut self, parent_id: Option<String>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = Some(is_favorite);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Title or content changed, so the searchable text is stale
    pub fn touches_text(&self) -> bool {
        self.title.is_some() || self.content.is_some()
    }

    /// Apply onto a page in memory (used by the in-memory store)
    pub fn apply_to(&self, page: &mut Page) {
        if let Some(title) = &self.title {
            page.title = title.clone();
        }
        if let Some(content) = &self.content {
            page.content = content.clone();
        }
        if let Some(parent_id) = &self.parent_id {
            page.parent_id = parent_id.clone();
        }
        if let Some(order) = self.order {
            page.order = order;
        }
        if let Some(is_favorite) = self.is_favorite {
            page.is_favorite = is_favorite;
        }
        if let Some(tags) = &self.tags {
            page.tags = tags.clone();
        }
        if let Some(searchable_text) = &self.searchable_text {
            page.searchable_text = searchable_text.clone();
        }
    }
}

/// Accept either `T` or `null` for a present field; absence is handled by
/// `#[serde(default)]`
pub(crate) fn deserialize_optional_field<'de, D, T>(
    deserializer: D,
) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Tags are stored as JSON text; anything unparseable reads as no tags
pub fn parse_tags(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

pub fn tags_to_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_update_double_option() {
        let cleared: PageUpdate = serde_json::from_value(json!({ "parentId": null })).unwrap();
        assert_eq!(cleared.parent_id, Some(None));

        let moved: PageUpdate = serde_json::from_value(json!({ "parentId": "p1" })).unwrap();
        assert_eq!(moved.parent_id, Some(Some("p1".to_string())));

        let untouched: PageUpdate = serde_json::from_value(json!({ "title": "x" })).unwrap();
        assert_eq!(untouched.parent_id, None);
        assert!(untouched.touches_text());
    }

    #[test]
    fn test_parse_tags_tolerates_garbage() {
        assert_eq!(parse_tags(r#"["a","b"]"#), vec!["a", "b"]);
        assert!(parse_tags("not json").is_empty());
        assert_eq!(tags_to_json(&[]), "[]");
    }

    #[test]
    fn test_page_with_relations_is_flat() {
        let now = Utc::now();
        let page = Page {
            id: "p1".to_string(),
            title: "Notes".to_string(),
            content: "[]".to_string(),
            parent_id: None,
            order: 0,
            is_favorite: false,
            tags: vec![],
            searchable_text: None,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(PageWithRelations {
            page,
            images: vec![],
            children: vec![],
        })
        .unwrap();

        assert_eq!(value["id"], "p1");
        assert_eq!(value["parentId"], serde_json::Value::Null);
        assert!(value["images"].as_array().unwrap().is_empty());
    }
}
