//! SQLite persistence for codeshift jobs
//!
//! Jobs are stored whole as JSON alongside a few queryable columns. Every
//! write refreshes the row's expiry; expired rows read as absent and are
//! removed by [`SqliteJobStore::purge_expired`].

pub mod error;
pub mod jobs;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

pub use error::{Error, Result};
pub use jobs::{JobSummary, SqliteJobStore};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        analysis_type TEXT NOT NULL,
        repository TEXT NOT NULL,
        error_details TEXT,
        data_json TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        expires_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_jobs_expires_at ON jobs(expires_at)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_updated_at ON jobs(updated_at)",
    "CREATE TABLE IF NOT EXISTS analysis_names (
        name TEXT PRIMARY KEY,
        job_id TEXT NOT NULL
    )",
];

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database file and its schema
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Io(format!("Failed to create database directory: {}", e)))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        debug!(path = %db_path.display(), "Database opened");
        Ok(db)
    }

    async fn initialize(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the job store
    pub fn jobs(&self) -> SqliteJobStore {
        SqliteJobStore::new(self.pool.clone())
    }
}
