//! Service Layer Error Types

use crate::db::DatabaseError;
use crate::hierarchy::PlanError;
use crate::models::ValidationError;
use thiserror::Error;

/// Page service errors
///
/// `PageNotFound` and `ImageNotFound` are expected outcomes the HTTP layer
/// turns into 404s; `Store` wraps backend failures with their context chain.
#[derive(Error, Debug)]
pub enum PageServiceError {
    #[error("Page not found: {id}")]
    PageNotFound { id: String },

    #[error("Image not found: {id}")]
    ImageNotFound { id: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Reorder request that would break the hierarchy
    #[error("Invalid move: {0}")]
    InvalidMove(PlanError),

    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Store operation failed: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl PageServiceError {
    pub fn page_not_found(id: impl Into<String>) -> Self {
        Self::PageNotFound { id: id.into() }
    }

    pub fn image_not_found(id: impl Into<String>) -> Self {
        Self::ImageNotFound { id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PageNotFound { .. } | Self::ImageNotFound { .. }
        )
    }
}

impl From<PlanError> for PageServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::PageNotFound(id) => Self::PageNotFound { id },
            other => Self::InvalidMove(other),
        }
    }
}
