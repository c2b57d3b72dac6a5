//! Database context for managing connections and repository access.
//!
//! The DbContext is the primary entry point for all database operations.
//! It holds the connection pool and the document directory, and hands out
//! repositories that share them.

use std::path::Path;

use diesel_async::SimpleAsyncConnection;

use super::call_log::CallLogRepository;
use super::index::IndexRepository;
use super::pool::{DbError, SqlitePool};
use super::records::RecordRepository;
use crate::storage::DocumentStore;

/// Database context that manages the connection pool and provides repository access.
///
/// # Example
/// ```ignore
/// let ctx = DbContext::new(&db_path, &xml_dir);
/// ctx.init_schema().await?;
/// let record = ctx.records().get(1).await?;
/// ```
#[derive(Clone, Debug)]
pub struct DbContext {
    pool: SqlitePool,
    documents: DocumentStore,
}

impl DbContext {
    /// Create a context from a database file path and the document directory.
    pub fn new(db_path: &Path, documents_dir: &Path) -> Self {
        Self {
            pool: SqlitePool::from_path(db_path),
            documents: DocumentStore::new(documents_dir),
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Record store (documents plus freshness rows).
    pub fn records(&self) -> RecordRepository {
        RecordRepository::new(self.pool.clone(), self.documents.clone())
    }

    /// Tag and relation queries.
    pub fn index(&self) -> IndexRepository {
        IndexRepository::new(self.pool.clone())
    }

    /// Upstream call log.
    pub fn call_log(&self) -> CallLogRepository {
        CallLogRepository::new(self.pool.clone())
    }

    /// Create tables and indexes if they don't exist.
    ///
    /// The layout matches databases written by earlier releases so an existing
    /// cache can be reused as-is.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        if let Some(parent) = Path::new(self.pool.database_url()).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(super::util::to_diesel_error)?;
            }
        }

        let mut conn = self.pool.get().await?;
        conn.batch_execute(
            r#"
            CREATE TABLE IF NOT EXISTS anime (
                aid INTEGER PRIMARY KEY,
                last_updated TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tags (
                aid INTEGER NOT NULL,
                name TEXT NOT NULL,
                weight INTEGER DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS relations (
                aid INTEGER NOT NULL,
                related_aid INTEGER NOT NULL,
                type TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS api_logs (
                timestamp TEXT NOT NULL,
                aid INTEGER,
                success INTEGER DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_tags_aid ON tags(aid);
            CREATE INDEX IF NOT EXISTS idx_relations_aid ON relations(aid);
            CREATE INDEX IF NOT EXISTS idx_api_logs_timestamp ON api_logs(timestamp);
            "#,
        )
        .await
    }
}
