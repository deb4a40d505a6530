//! Database Layer
//!
//! Pages, images and settings persist in a local libsql (SQLite) file:
//!
//! - [`DatabaseService`] opens the file, creates the schema and owns the SQL
//! - [`PageStore`] is the async boundary the page service talks to
//! - [`LibsqlStore`] and [`MemoryStore`] implement it
//!
//! Full-text search uses an FTS5 table kept in sync by triggers, so callers
//! never write to the index directly.

mod database;
mod error;
mod libsql_store;
mod memory_store;
mod page_store;

pub use database::{timestamp, DatabaseService, DbCreatePageParams};
pub use error::{DatabaseError, Record};
pub use libsql_store::LibsqlStore;
pub use memory_store::MemoryStore;
pub use page_store::PageStore;
