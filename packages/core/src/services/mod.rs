//! Business Services
//!
//! - `PageService` - page CRUD, hierarchy moves, search, images and settings
//!
//! Services sit between the HTTP layer and the [`PageStore`](crate::db::PageStore)
//! boundary, applying defaults and turning misses into typed errors.

pub mod error;
pub mod page_service;

pub use error::PageServiceError;
pub use page_service::{PageService, SearchHit, SearchQuery, SEARCH_LIMIT};
