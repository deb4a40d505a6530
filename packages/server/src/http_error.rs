//! HTTP error responses
//!
//! Every failure leaves the API as `{ "error": ..., "code": ... }`. The
//! status is derived from the code, so handlers only pick a code and a
//! user-facing message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use notesai_core::{AssistantError, PageServiceError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpError {
    /// User-facing message
    pub error: String,
    /// Machine-readable code
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HttpError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        code: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: Some(details.into()),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(error, "VALIDATION_ERROR")
    }

    /// Map a service failure; `failure` is the generic message used for
    /// anything that is not the caller's fault ("Failed to update page")
    pub fn from_service(err: PageServiceError, failure: &str) -> Self {
        match err {
            PageServiceError::PageNotFound { .. } => Self::new("Page not found", "PAGE_NOT_FOUND"),
            PageServiceError::ImageNotFound { .. } => {
                Self::new("Image not found", "IMAGE_NOT_FOUND")
            }
            PageServiceError::ValidationFailed(e) => Self::new(e.to_string(), "VALIDATION_ERROR"),
            PageServiceError::InvalidMove(e) => Self::new(e.to_string(), "INVALID_MOVE"),
            other => {
                tracing::error!("{}: {}", failure, other);
                Self::with_details(failure, "INTERNAL_ERROR", other.to_string())
            }
        }
    }

    pub fn from_assistant(err: AssistantError, failure: &str) -> Self {
        match err {
            AssistantError::Busy { current } => Self::new(
                format!("A {} task is already running", current),
                "ASSISTANT_BUSY",
            ),
            AssistantError::Document(message) => Self::new(message, "VALIDATION_ERROR"),
            AssistantError::Pages(e) => Self::from_service(e, failure),
            other => {
                tracing::error!("{}: {}", failure, other);
                Self::with_details(failure, "ASSISTANT_ERROR", other.to_string())
            }
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "PAGE_NOT_FOUND" | "IMAGE_NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "INVALID_MOVE" | "ASSISTANT_UNAVAILABLE" => {
                StatusCode::BAD_REQUEST
            }
            "ASSISTANT_BUSY" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesai_core::TaskKind;

    #[test]
    fn test_not_found_keeps_generic_message() {
        let err = HttpError::from_service(
            PageServiceError::page_not_found("abc"),
            "Failed to fetch page",
        );
        assert_eq!(err.error, "Page not found");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_store_failure_is_500_with_generic_message() {
        let err = HttpError::from_service(
            PageServiceError::Store(anyhow::anyhow!("disk full")),
            "Failed to update page",
        );
        assert_eq!(err.error, "Failed to update page");
        assert!(err.details.as_deref().unwrap_or_default().contains("disk full"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_busy_assistant_is_conflict() {
        let err = HttpError::from_assistant(
            AssistantError::Busy {
                current: TaskKind::Summary,
            },
            "Failed to start task",
        );
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
