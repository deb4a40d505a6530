//! Database Connection Management
//!
//! Opens the local libsql database that holds pages, images and settings,
//! creates the schema on first use and exposes the raw SQL operations the
//! [`LibsqlStore`](super::LibsqlStore) wraps.
//!
//! # Schema
//!
//! - `pages`: one row per page; `parent_id` is a plain column so children of
//!   a deleted page keep pointing at it
//! - `images`: metadata rows, deleted together with their page
//! - `settings`: a single row keyed `"settings"`
//! - `pages_fts`: FTS5 index over title and searchable text, kept in sync
//!   by triggers
//!
//! # Connections
//!
//! Always use `connect_with_timeout()` from async code. It applies the busy
//! timeout and enables foreign keys, both of which SQLite scopes to a single
//! connection.
//!
//! Timestamps are stored as RFC3339 text with millisecond precision so that
//! `ORDER BY updated_at` sorts chronologically.

use crate::db::error::{DatabaseError, Record};
use crate::hierarchy::{plan_move, MoveRequest, OrderEntry, PlanError, ReorderPlan};
use crate::models::{tags_to_json, Image, PageUpdate, Settings};
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Builder, Database, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Column list shared by every page query, in `row_to_page` order
pub(crate) const PAGE_COLUMNS: &str = "id, title, content, parent_id, sort_order, is_favorite, tags, searchable_text, created_at, updated_at";

/// Column list shared by every image query, in `row_to_image` order
pub(crate) const IMAGE_COLUMNS: &str =
    "id, filename, original_name, mime_type, size, page_id, created_at, updated_at";

pub(crate) const SETTINGS_COLUMNS: &str = "id, ai_engine, lm_studio_url, lm_studio_model, preferred_model, fallback_enabled, created_at, updated_at";

/// Format a timestamp for storage
pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, text)
}

fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

/// Parameters for page insertion
pub struct DbCreatePageParams<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub parent_id: Option<&'a str>,
    pub order: i64,
    pub is_favorite: bool,
    pub tags: &'a [String],
    pub searchable_text: Option<&'a str>,
    pub created_at: &'a DateTime<Utc>,
    pub updated_at: &'a DateTime<Utc>,
}

/// Database service for the page store
///
/// ```no_run
/// use notesai_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = DatabaseService::new(PathBuf::from("./data/notesai.db")).await?;
///     db.db_close().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub db: Arc<Database>,
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Open (or create) the database at `db_path`
    ///
    /// Creates missing parent directories, then the schema. Safe to call on
    /// an existing database; every statement is `IF NOT EXISTS`.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        if db_path.as_os_str().is_empty() || db_path.is_dir() {
            return Err(DatabaseError::InvalidPath { path: db_path });
        }

        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::PermissionDenied {
                            path: db_path.clone(),
                        }
                    } else {
                        DatabaseError::CreateDirectory {
                            path: parent.to_path_buf(),
                            source: e,
                        }
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|source| DatabaseError::Open {
                path: db_path.clone(),
                source,
            })?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };
        service.initialize_schema(is_new_database).await?;

        tracing::info!("Database ready at {}", service.db_path.display());
        Ok(service)
    }

    /// PRAGMA statements return rows, so they go through `query()`
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &'static str,
    ) -> Result<(), DatabaseError> {
        let failed = |source| DatabaseError::Pragma { pragma, source };
        let mut stmt = conn.prepare(pragma).await.map_err(failed)?;
        let _ = stmt.query(()).await.map_err(failed)?;
        Ok(())
    }

    async fn execute_ddl(
        &self,
        conn: &libsql::Connection,
        object: &'static str,
        sql: &str,
    ) -> Result<(), DatabaseError> {
        conn.execute(sql, ())
            .await
            .map_err(|source| DatabaseError::Schema { object, source })?;
        Ok(())
    }

    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        self.execute_ddl(
            &conn,
            "pages table",
            "CREATE TABLE IF NOT EXISTS pages (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                parent_id TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                is_favorite INTEGER NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '[]',
                searchable_text TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .await?;

        self.execute_ddl(
            &conn,
            "images table",
            "CREATE TABLE IF NOT EXISTS images (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                original_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                page_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE
            )",
        )
        .await?;

        self.execute_ddl(
            &conn,
            "settings table",
            "CREATE TABLE IF NOT EXISTS settings (
                id TEXT PRIMARY KEY,
                ai_engine TEXT NOT NULL DEFAULT 'webllm',
                lm_studio_url TEXT NOT NULL,
                lm_studio_model TEXT,
                preferred_model TEXT,
                fallback_enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .await?;

        for (what, sql) in [
            (
                "idx_pages_parent",
                "CREATE INDEX IF NOT EXISTS idx_pages_parent ON pages(parent_id, sort_order)",
            ),
            (
                "idx_pages_updated",
                "CREATE INDEX IF NOT EXISTS idx_pages_updated ON pages(updated_at)",
            ),
            (
                "idx_images_page",
                "CREATE INDEX IF NOT EXISTS idx_images_page ON images(page_id)",
            ),
        ] {
            self.execute_ddl(&conn, what, sql).await?;
        }

        self.create_search_index(&conn).await?;

        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// FTS5 table plus the triggers that mirror `pages` into it
    async fn create_search_index(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        self.execute_ddl(
            conn,
            "pages_fts table",
            "CREATE VIRTUAL TABLE IF NOT EXISTS pages_fts USING fts5(
                id UNINDEXED,
                title,
                searchable_text
            )",
        )
        .await?;

        self.execute_ddl(
            conn,
            "pages_fts insert trigger",
            "CREATE TRIGGER IF NOT EXISTS pages_fts_insert AFTER INSERT ON pages BEGIN
                INSERT INTO pages_fts (id, title, searchable_text)
                VALUES (new.id, new.title, COALESCE(new.searchable_text, ''));
            END",
        )
        .await?;

        self.execute_ddl(
            conn,
            "pages_fts update trigger",
            "CREATE TRIGGER IF NOT EXISTS pages_fts_update AFTER UPDATE ON pages BEGIN
                DELETE FROM pages_fts WHERE id = old.id;
                INSERT INTO pages_fts (id, title, searchable_text)
                VALUES (new.id, new.title, COALESCE(new.searchable_text, ''));
            END",
        )
        .await?;

        self.execute_ddl(
            conn,
            "pages_fts delete trigger",
            "CREATE TRIGGER IF NOT EXISTS pages_fts_delete AFTER DELETE ON pages BEGIN
                DELETE FROM pages_fts WHERE id = old.id;
            END",
        )
        .await
    }

    /// Raw connection for synchronous, single-threaded use
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::Libsql)
    }

    /// Connection with a 5 s busy timeout and foreign keys enabled
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;
        Ok(conn)
    }

    async fn query_rows(
        &self,
        action: &'static str,
        record: Record,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut stmt = match conn.prepare(sql).await {
            Ok(stmt) => stmt,
            Err(e) => return Err(DatabaseError::statement(action, record, e)),
        };
        stmt.query(params)
            .await
            .map_err(|e| DatabaseError::statement(action, record, e))
    }

    async fn query_one(
        &self,
        action: &'static str,
        record: Record,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Option<libsql::Row>, DatabaseError> {
        let mut rows = self.query_rows(action, record.clone(), sql, params).await?;
        rows.next()
            .await
            .map_err(|e| DatabaseError::statement(action, record, e))
    }

    async fn execute(
        &self,
        action: &'static str,
        record: Record,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(sql, params)
            .await
            .map_err(|e| DatabaseError::statement(action, record, e))
    }

    //
    // PAGES
    //

    pub async fn db_create_page(&self, params: DbCreatePageParams<'_>) -> Result<(), DatabaseError> {
        self.execute(
            "insert",
            Record::Page(params.id.to_string()),
            &format!(
                "INSERT INTO pages ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                PAGE_COLUMNS
            ),
            vec![
                text(params.id),
                text(params.title),
                text(params.content),
                optional_text(params.parent_id),
                Value::Integer(params.order),
                flag(params.is_favorite),
                text(&tags_to_json(params.tags)),
                optional_text(params.searchable_text),
                text(&timestamp(params.created_at)),
                text(&timestamp(params.updated_at)),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn db_get_page(&self, id: &str) -> Result<Option<libsql::Row>, DatabaseError> {
        self.query_one(
            "read",
            Record::Page(id.to_string()),
            &format!("SELECT {} FROM pages WHERE id = ?", PAGE_COLUMNS),
            vec![text(id)],
        )
        .await
    }

    /// Every page, sibling order ascending
    pub async fn db_list_pages(&self) -> Result<libsql::Rows, DatabaseError> {
        self.query_rows(
            "list",
            Record::Pages,
            &format!(
                "SELECT {} FROM pages ORDER BY sort_order ASC, created_at ASC",
                PAGE_COLUMNS
            ),
            vec![],
        )
        .await
    }

    pub async fn db_get_children(&self, parent_id: &str) -> Result<libsql::Rows, DatabaseError> {
        self.query_rows(
            "list children of",
            Record::Page(parent_id.to_string()),
            &format!(
                "SELECT {} FROM pages WHERE parent_id = ? ORDER BY sort_order ASC",
                PAGE_COLUMNS
            ),
            vec![text(parent_id)],
        )
        .await
    }

    /// Write the fields present in `update`; returns the affected row count
    pub async fn db_update_page(
        &self,
        id: &str,
        update: &PageUpdate,
        updated_at: &DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(title) = &update.title {
            assignments.push("title = ?");
            params.push(text(title));
        }
        if let Some(content) = &update.content {
            assignments.push("content = ?");
            params.push(text(content));
        }
        if let Some(parent_id) = &update.parent_id {
            assignments.push("parent_id = ?");
            params.push(optional_text(parent_id.as_deref()));
        }
        if let Some(order) = update.order {
            assignments.push("sort_order = ?");
            params.push(Value::Integer(order));
        }
        if let Some(is_favorite) = update.is_favorite {
            assignments.push("is_favorite = ?");
            params.push(flag(is_favorite));
        }
        if let Some(tags) = &update.tags {
            assignments.push("tags = ?");
            params.push(text(&tags_to_json(tags)));
        }
        if let Some(searchable_text) = &update.searchable_text {
            assignments.push("searchable_text = ?");
            params.push(optional_text(searchable_text.as_deref()));
        }
        assignments.push("updated_at = ?");
        params.push(text(&timestamp(updated_at)));
        params.push(text(id));

        self.execute(
            "update",
            Record::Page(id.to_string()),
            &format!("UPDATE pages SET {} WHERE id = ?", assignments.join(", ")),
            params,
        )
        .await
    }

    /// Delete a page; its images go with it through the foreign key
    pub async fn db_delete_page(&self, id: &str) -> Result<u64, DatabaseError> {
        self.execute(
            "delete",
            Record::Page(id.to_string()),
            "DELETE FROM pages WHERE id = ?",
            vec![text(id)],
        )
            .await
    }

    /// Full-text search over title and searchable text
    ///
    /// `fts_query` is passed to `MATCH` as is. Pages whose title contains
    /// `term` rank first, then most recently updated.
    pub async fn db_search_pages(
        &self,
        fts_query: &str,
        term: &str,
        limit: i64,
    ) -> Result<libsql::Rows, DatabaseError> {
        self.query_rows(
            "search",
            Record::Pages,
            &format!(
                "SELECT {} FROM pages
                 WHERE id IN (SELECT id FROM pages_fts WHERE pages_fts MATCH ?)
                 ORDER BY CASE WHEN LOWER(title) LIKE LOWER(?) THEN 0 ELSE 1 END,
                          updated_at DESC
                 LIMIT ?",
                PAGE_COLUMNS
            ),
            vec![
                text(fts_query),
                text(&format!("%{}%", term)),
                Value::Integer(limit),
            ],
        )
        .await
    }

    /// Move a page and shift its siblings in one transaction
    ///
    /// The sibling snapshot is read after `BEGIN IMMEDIATE`, so no other
    /// writer can change orders between planning and applying. An invalid
    /// move rolls back and comes back as the inner `Err`.
    pub async fn db_move_page(
        &self,
        request: &MoveRequest,
        updated_at: &DateTime<Utc>,
    ) -> Result<Result<ReorderPlan, PlanError>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::transaction("begin", Record::Page(request.page_id.clone()), e)
        })?;

        let result = self.apply_move(&conn, request, updated_at).await;
        match result {
            Ok(Ok(plan)) => {
                if let Err(e) = conn.execute("COMMIT", ()).await {
                    let _rollback = conn.execute("ROLLBACK", ()).await;
                    return Err(DatabaseError::transaction(
                        "commit",
                        Record::Page(plan.page_id),
                        e,
                    ));
                }
                Ok(Ok(plan))
            }
            Ok(Err(rejected)) => {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                Ok(Err(rejected))
            }
            Err(e) => {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn apply_move(
        &self,
        conn: &libsql::Connection,
        request: &MoveRequest,
        updated_at: &DateTime<Utc>,
    ) -> Result<Result<ReorderPlan, PlanError>, DatabaseError> {
        let mut snapshot = Vec::new();
        {
            let mut stmt = conn
                .prepare("SELECT id, parent_id, sort_order FROM pages")
                .await
                .map_err(|e| DatabaseError::statement("snapshot", Record::Pages, e))?;
            let mut rows = stmt
                .query(())
                .await
                .map_err(|e| DatabaseError::statement("snapshot", Record::Pages, e))?;
            while let Some(row) = rows.next().await? {
                snapshot.push(OrderEntry {
                    id: row.get::<String>(0)?,
                    parent_id: row.get::<Option<String>>(1)?,
                    order: row.get::<i64>(2)?,
                });
            }
        }

        let plan = match plan_move(&snapshot, request) {
            Ok(plan) => plan,
            Err(rejected) => return Ok(Err(rejected)),
        };

        let stamp = timestamp(updated_at);
        for update in &plan.sibling_updates {
            conn.execute(
                "UPDATE pages SET sort_order = ?, updated_at = ? WHERE id = ?",
                vec![
                    Value::Integer(update.order),
                    text(&stamp),
                    text(&update.id),
                ],
            )
            .await
            .map_err(|e| DatabaseError::statement("shift", Record::Page(update.id.clone()), e))?;
        }

        conn.execute(
            "UPDATE pages SET sort_order = ?, parent_id = ?, updated_at = ? WHERE id = ?",
            vec![
                Value::Integer(plan.new_order),
                optional_text(plan.new_parent_id.as_deref()),
                text(&stamp),
                text(&plan.page_id),
            ],
        )
        .await
        .map_err(|e| DatabaseError::statement("move", Record::Page(plan.page_id.clone()), e))?;

        tracing::debug!(
            "Moved page {} with {} sibling shifts",
            plan.page_id,
            plan.sibling_updates.len()
        );
        Ok(Ok(plan))
    }

    /// Refill `pages_fts` from the `pages` table
    pub async fn db_rebuild_search_index(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute("BEGIN TRANSACTION", ())
            .await
            .map_err(|e| DatabaseError::transaction("begin", Record::SearchIndex, e))?;

        for sql in [
            "DELETE FROM pages_fts",
            "INSERT INTO pages_fts (id, title, searchable_text)
             SELECT id, title, COALESCE(searchable_text, '') FROM pages",
        ] {
            if let Err(e) = conn.execute(sql, ()).await {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                return Err(DatabaseError::statement("rebuild", Record::SearchIndex, e));
            }
        }

        conn.execute("COMMIT", ())
            .await
            .map_err(|e| DatabaseError::transaction("commit", Record::SearchIndex, e))?;
        Ok(())
    }

    //
    // IMAGES
    //

    /// Insert or overwrite an image row
    pub async fn db_save_image(&self, image: &Image) -> Result<(), DatabaseError> {
        self.execute(
            "save",
            Record::Image(image.id.clone()),
            &format!(
                "INSERT INTO images ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    filename = excluded.filename,
                    original_name = excluded.original_name,
                    mime_type = excluded.mime_type,
                    size = excluded.size,
                    page_id = excluded.page_id,
                    updated_at = excluded.updated_at",
                IMAGE_COLUMNS
            ),
            vec![
                text(&image.id),
                text(&image.filename),
                text(&image.original_name),
                text(&image.mime_type),
                Value::Integer(image.size),
                text(&image.page_id),
                text(&timestamp(&image.created_at)),
                text(&timestamp(&image.updated_at)),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn db_get_image(&self, id: &str) -> Result<Option<libsql::Row>, DatabaseError> {
        self.query_one(
            "read",
            Record::Image(id.to_string()),
            &format!("SELECT {} FROM images WHERE id = ?", IMAGE_COLUMNS),
            vec![text(id)],
        )
        .await
    }

    /// Images, newest first; all of them or only one page's
    pub async fn db_list_images(&self, page_id: Option<&str>) -> Result<libsql::Rows, DatabaseError> {
        match page_id {
            Some(page_id) => {
                self.query_rows(
                    "list images of",
                    Record::Page(page_id.to_string()),
                    &format!(
                        "SELECT {} FROM images WHERE page_id = ? ORDER BY created_at DESC",
                        IMAGE_COLUMNS
                    ),
                    vec![text(page_id)],
                )
                .await
            }
            None => {
                self.query_rows(
                    "list",
                    Record::Images,
                    &format!("SELECT {} FROM images ORDER BY created_at DESC", IMAGE_COLUMNS),
                    vec![],
                )
                .await
            }
        }
    }

    pub async fn db_delete_image(&self, id: &str) -> Result<u64, DatabaseError> {
        self.execute(
            "delete",
            Record::Image(id.to_string()),
            "DELETE FROM images WHERE id = ?",
            vec![text(id)],
        )
            .await
    }

    //
    // SETTINGS
    //

    pub async fn db_get_settings(&self, id: &str) -> Result<Option<libsql::Row>, DatabaseError> {
        self.query_one(
            "read",
            Record::Settings,
            &format!("SELECT {} FROM settings WHERE id = ?", SETTINGS_COLUMNS),
            vec![text(id)],
        )
        .await
    }

    pub async fn db_upsert_settings(&self, settings: &Settings) -> Result<(), DatabaseError> {
        self.execute(
            "save",
            Record::Settings,
            &format!(
                "INSERT INTO settings ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    ai_engine = excluded.ai_engine,
                    lm_studio_url = excluded.lm_studio_url,
                    lm_studio_model = excluded.lm_studio_model,
                    preferred_model = excluded.preferred_model,
                    fallback_enabled = excluded.fallback_enabled,
                    updated_at = excluded.updated_at",
                SETTINGS_COLUMNS
            ),
            vec![
                text(&settings.id),
                text(settings.ai_engine.as_str()),
                text(&settings.lm_studio_url),
                optional_text(settings.lm_studio_model.as_deref()),
                optional_text(settings.preferred_model.as_deref()),
                flag(settings.fallback_enabled),
                text(&timestamp(&settings.created_at)),
                text(&timestamp(&settings.updated_at)),
            ],
        )
        .await?;
        Ok(())
    }

    /// Flush the WAL before shutdown
    pub async fn db_close(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn table_names(db: &DatabaseService) -> Vec<String> {
        let conn = db.connect().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type IN ('table', 'trigger', 'index')")
            .await
            .unwrap();
        let mut rows = stmt.query(()).await.unwrap();
        let mut names = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            names.push(row.get::<String>(0).unwrap());
        }
        names
    }

    fn page_params<'a>(
        id: &'a str,
        title: &'a str,
        parent_id: Option<&'a str>,
        order: i64,
        now: &'a DateTime<Utc>,
    ) -> DbCreatePageParams<'a> {
        DbCreatePageParams {
            id,
            title,
            content: "[]",
            parent_id,
            order,
            is_favorite: false,
            tags: &[],
            searchable_text: Some(title),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_schema_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("notes.db");
        let db = DatabaseService::new(db_path.clone()).await.unwrap();

        assert!(db_path.exists());
        let names = table_names(&db).await;
        for expected in [
            "pages",
            "images",
            "settings",
            "pages_fts",
            "pages_fts_insert",
            "pages_fts_update",
            "pages_fts_delete",
            "idx_pages_parent",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[tokio::test]
    async fn test_idempotent_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("notes.db");

        let first = DatabaseService::new(db_path.clone()).await.unwrap();
        let now = Utc::now();
        first
            .db_create_page(page_params("p1", "Kept", None, 0, &now))
            .await
            .unwrap();
        first.db_close().await.unwrap();
        drop(first);

        let second = DatabaseService::new(db_path).await.unwrap();
        assert!(second.db_get_page("p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rejects_directory_path() {
        let temp_dir = TempDir::new().unwrap();
        let err = DatabaseService::new(temp_dir.path().to_path_buf())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidPath { .. }));
    }

    #[tokio::test]
    async fn test_failed_statement_names_its_record() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::new(temp_dir.path().join("notes.db"))
            .await
            .unwrap();
        db.connect()
            .unwrap()
            .execute("DROP TABLE images", ())
            .await
            .unwrap();

        let err = db.db_delete_image("img-1").await.unwrap_err();
        assert_eq!(err.record(), Some(&Record::Image("img-1".to_string())));
        assert!(err.to_string().starts_with("Failed to delete image img-1: "));

        match db.db_list_images(Some("p-1")).await {
            Err(err) => {
                assert!(err.to_string().starts_with("Failed to list images of page p-1: "))
            }
            Ok(_) => panic!("listing images without the table should fail"),
        }
    }

    #[tokio::test]
    async fn test_wal_and_foreign_keys() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::new(temp_dir.path().join("notes.db"))
            .await
            .unwrap();
        let conn = db.connect_with_timeout().await.unwrap();

        let mut stmt = conn.prepare("PRAGMA journal_mode").await.unwrap();
        let mut rows = stmt.query(()).await.unwrap();
        let mode: String = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        let mut stmt = conn.prepare("PRAGMA foreign_keys").await.unwrap();
        let mut rows = stmt.query(()).await.unwrap();
        let enabled: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_move_rolls_back_on_rejected_plan() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::new(temp_dir.path().join("notes.db"))
            .await
            .unwrap();
        let now = Utc::now();
        db.db_create_page(page_params("a", "A", None, 0, &now))
            .await
            .unwrap();
        db.db_create_page(page_params("b", "B", Some("a"), 0, &now))
            .await
            .unwrap();

        let rejected = db
            .db_move_page(
                &MoveRequest {
                    page_id: "a".into(),
                    new_order: 0,
                    new_parent_id: Some("b".into()),
                },
                &now,
            )
            .await
            .unwrap();
        assert!(rejected.is_err());

        // The transaction was released; a valid move still goes through.
        let plan = db
            .db_move_page(
                &MoveRequest {
                    page_id: "b".into(),
                    new_order: 0,
                    new_parent_id: None,
                },
                &now,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(plan.sibling_updates.len(), 1);
    }
}
