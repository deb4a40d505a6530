//! Image metadata attached to a page

use super::page::Page;
use super::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub page_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Image plus the page it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageWithPage {
    #[serde(flatten)]
    pub image: Image,
    pub page: Option<Page>,
}

/// Input for registering an uploaded image
///
/// Fields are optional on the wire so a missing one yields a validation
/// error rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateImage {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub page_id: Option<String>,
}

/// Validated form of [`CreateImage`]
#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub page_id: String,
}

fn required(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

impl CreateImage {
    /// All five fields must be present, strings non-empty and size non-zero
    pub fn validate(&self) -> Result<NewImage, ValidationError> {
        let missing = || ValidationError::MissingField("Missing required fields".to_string());

        Ok(NewImage {
            filename: required(&self.filename).ok_or_else(missing)?,
            original_name: required(&self.original_name).ok_or_else(missing)?,
            mime_type: required(&self.mime_type).ok_or_else(missing)?,
            size: self.size.filter(|s| *s != 0).ok_or_else(missing)?,
            page_id: required(&self.page_id).ok_or_else(missing)?,
        })
    }
}

/// Partial image update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
}

impl ImageUpdate {
    pub fn apply_to(&self, image: &mut Image) {
        if let Some(filename) = &self.filename {
            image.filename = filename.clone();
        }
        if let Some(original_name) = &self.original_name {
            image.original_name = original_name.clone();
        }
        if let Some(mime_type) = &self.mime_type {
            image.mime_type = mime_type.clone();
        }
        if let Some(size) = self.size {
            image.size = size;
        }
        if let Some(page_id) = &self.page_id {
            image.page_id = page_id.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_image_requires_every_field() {
        let complete: CreateImage = serde_json::from_value(json!({
            "filename": "a.png",
            "originalName": "photo.png",
            "mimeType": "image/png",
            "size": 1024,
            "pageId": "p1"
        }))
        .unwrap();
        let image = complete.validate().unwrap();
        assert_eq!(image.size, 1024);

        let mut zero_size = complete.clone();
        zero_size.size = Some(0);
        assert!(zero_size.validate().is_err());

        let mut empty_name = complete.clone();
        empty_name.original_name = Some(String::new());
        let err = empty_name.validate().unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields");

        let missing: CreateImage = serde_json::from_value(json!({ "filename": "a.png" })).unwrap();
        assert!(missing.validate().is_err());
    }
}
