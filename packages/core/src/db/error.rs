//! Database Error Types
//!
//! Errors raised by [`DatabaseService`](super::DatabaseService). Statement
//! failures name the [`Record`] they were working on, so a log line says
//! which page or image a write failed for. Missing rows are not errors
//! here; lookups return `Option` and the page service decides what a miss
//! means.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// What a statement was reading or writing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Page(String),
    /// Several pages at once: listings, search, sibling snapshots
    Pages,
    Image(String),
    Images,
    Settings,
    SearchIndex,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Page(id) => write!(f, "page {}", id),
            Record::Pages => f.write_str("pages"),
            Record::Image(id) => write!(f, "image {}", id),
            Record::Images => f.write_str("images"),
            Record::Settings => f.write_str("settings"),
            Record::SearchIndex => f.write_str("search index"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Path is empty or points at a directory
    #[error("Invalid database path: {path}")]
    InvalidPath { path: PathBuf },

    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: libsql::Error,
    },

    /// A table, trigger or the FTS5 index could not be created
    #[error("Failed to create {object}: {source}")]
    Schema {
        object: &'static str,
        source: libsql::Error,
    },

    #[error("Failed to run '{pragma}': {source}")]
    Pragma {
        pragma: &'static str,
        source: libsql::Error,
    },

    #[error("Failed to {action} {record}: {source}")]
    Statement {
        action: &'static str,
        record: Record,
        source: libsql::Error,
    },

    /// `BEGIN` or `COMMIT` around a multi-row write
    #[error("Failed to {step} transaction for {record}: {source}")]
    Transaction {
        step: &'static str,
        record: Record,
        source: libsql::Error,
    },

    /// Connection setup or a row that does not decode
    #[error("Database operation failed: {0}")]
    Libsql(#[from] libsql::Error),
}

impl DatabaseError {
    pub fn statement(action: &'static str, record: Record, source: libsql::Error) -> Self {
        Self::Statement {
            action,
            record,
            source,
        }
    }

    pub fn transaction(step: &'static str, record: Record, source: libsql::Error) -> Self {
        Self::Transaction {
            step,
            record,
            source,
        }
    }

    /// The record a failed statement was about, when there was one
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Statement { record, .. } | Self::Transaction { record, .. } => Some(record),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_error_names_the_record() {
        let err = DatabaseError::statement(
            "update",
            Record::Page("p-1".into()),
            libsql::Error::ConnectionFailed("locked".into()),
        );
        let message = err.to_string();
        assert!(message.starts_with("Failed to update page p-1: "), "{}", message);
        assert_eq!(err.record(), Some(&Record::Page("p-1".into())));

        let err = DatabaseError::transaction(
            "commit",
            Record::SearchIndex,
            libsql::Error::ConnectionFailed("busy".into()),
        );
        assert!(err.to_string().starts_with("Failed to commit transaction for search index"));

        let err = DatabaseError::InvalidPath {
            path: PathBuf::from(""),
        };
        assert_eq!(err.record(), None);
    }
}
