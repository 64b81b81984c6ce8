use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::retry::execute_with_retry;
use crate::config::AppConfig;
use crate::{Error, Result};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open the configured database and ensure the schema exists
    pub async fn new(config: &AppConfig) -> Result<Self> {
        Self::open(&config.database_path()).await
    }

    /// Open (creating if missing) the database at `db_path`.
    ///
    /// Any failure to reach the store is reported as `StoreUnavailable`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreUnavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let db_url = format!("sqlite:{}", db_path.display());

        tracing::info!("Connecting to database: {}", db_path.display());

        // PRAGMAs are per-connection, so set them on the options rather than once
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        let db = Self { pool };
        db.ensure_schema().await?;

        Ok(db)
    }

    /// Create an in-memory database for testing
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;

        Ok(db)
    }

    /// Create the articles table and its indexes if absent. Idempotent.
    pub async fn ensure_schema(&self) -> Result<()> {
        tracing::debug!("Ensuring database schema");

        for statement in [SCHEMA_ARTICLES, INDEX_PUBLISHED_AT, INDEX_SOURCE] {
            let pool = self.pool.clone();
            execute_with_retry(|| {
                let pool = pool.clone();
                async move { sqlx::query(statement).execute(&pool).await.map(|_| ()) }
            })
            .await?;
        }

        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

const SCHEMA_ARTICLES: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT,
    title TEXT,
    url TEXT UNIQUE,
    authors TEXT,
    published_at TIMESTAMP,
    text TEXT,
    sentiment REAL,
    entities TEXT,
    topics TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
"#;

const INDEX_PUBLISHED_AT: &str =
    "CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at DESC)";

const INDEX_SOURCE: &str = "CREATE INDEX IF NOT EXISTS idx_articles_source ON articles(source)";
