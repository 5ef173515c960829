//! Job store backed by SQLite

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, warn};

use codeshift_core::job::normalize_analysis_name;
use codeshift_core::{Job, JobId, JobStatus, JobStore};

use crate::error::Result;

/// Listing row for a job
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobSummary {
    pub id: String,
    pub status: String,
    pub analysis_type: String,
    pub repository: String,
    pub error_details: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobSummary {
    pub fn status(&self) -> JobStatus {
        JobStatus::from(self.status.as_str())
    }
}

/// SQLite implementation of [`JobStore`]
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry_after(ttl: Duration) -> i64 {
    let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_millis().saturating_add(ttl)
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write a job row, replacing any previous version
    pub async fn save(&self, job: &Job, ttl: Duration) -> Result<()> {
        let data_json = serde_json::to_string(job)?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, status, analysis_type, repository, error_details,
                data_json, created_at, updated_at, expires_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                error_details = excluded.error_details,
                data_json = excluded.data_json,
                updated_at = excluded.updated_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(job.id.as_str())
        .bind(job.status.as_str())
        .bind(&job.data.analysis_type)
        .bind(&job.data.repository)
        .bind(&job.error_details)
        .bind(&data_json)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(expiry_after(ttl))
        .execute(&self.pool)
        .await?;

        debug!(job_id = %job.id, status = %job.status, "Job saved");
        Ok(())
    }

    /// Load a live job
    pub async fn load(&self, id: &JobId) -> Result<Option<Job>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT data_json FROM jobs WHERE id = ? AND expires_at > ?")
                .bind(id.as_str())
                .bind(now_millis())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Most recently updated live jobs
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<JobSummary>> {
        let rows = sqlx::query_as::<_, JobSummary>(
            r#"
            SELECT id, status, analysis_type, repository, error_details, updated_at
            FROM jobs
            WHERE expires_at > ?
            ORDER BY updated_at DESC
            LIMIT ?
            "#,
        )
        .bind(now_millis())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Delete expired jobs and the names pointing at them
    pub async fn purge_expired(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM jobs WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM analysis_names WHERE job_id NOT IN (SELECT id FROM jobs)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if deleted > 0 {
            debug!(deleted, "Purged expired jobs");
        }
        Ok(deleted)
    }

    pub async fn index_name(&self, name: &str, id: &JobId) -> Result<()> {
        sqlx::query(
            "INSERT INTO analysis_names (name, job_id) VALUES (?, ?)
             ON CONFLICT(name) DO UPDATE SET job_id = excluded.job_id",
        )
        .bind(normalize_analysis_name(name))
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_name(&self, name: &str) -> Result<Option<JobId>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT job_id FROM analysis_names WHERE name = ?")
                .bind(normalize_analysis_name(name))
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| JobId::from(id)))
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn get(&self, id: &JobId) -> codeshift_core::Result<Option<Job>> {
        Ok(self.load(id).await?)
    }

    async fn set(&self, job: &Job, ttl: Duration) -> codeshift_core::Result<()> {
        Ok(self.save(job, ttl).await?)
    }

    async fn index_analysis_name(&self, name: &str, id: &JobId) -> codeshift_core::Result<()> {
        if normalize_analysis_name(name).is_empty() {
            warn!(job_id = %id, "Ignoring blank analysis name");
            return Ok(());
        }
        Ok(self.index_name(name, id).await?)
    }

    async fn find_by_analysis_name(&self, name: &str) -> codeshift_core::Result<Option<JobId>> {
        Ok(self.find_name(name).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use codeshift_core::{JobRequest, StepResult};
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    async fn store() -> (TempDir, SqliteJobStore) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(temp_dir.path().join("jobs.db")).await.unwrap();
        (temp_dir, db.jobs())
    }

    fn job() -> Job {
        Job::new(
            JobRequest {
                repository: "acme/api".to_string(),
                analysis_type: "relatorio".to_string(),
                analysis_name: Some("Audit".to_string()),
                ..Default::default()
            }
            .into(),
        )
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (_dir, store) = store().await;
        let mut job = job();
        job.data.steps.insert(0, StepResult::report("R"));
        job.data.paused_at_step = Some(0);

        store.set(&job, DAY).await.unwrap();
        let loaded = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded, job);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let (_dir, store) = store().await;
        let mut job = job();
        store.set(&job, DAY).await.unwrap();

        job.fail("Error in step 0 (analyzing): boom");
        store.set(&job, DAY).await.unwrap();

        let loaded = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
        assert_eq!(loaded.error_details, job.error_details);

        let listed = store.list_recent(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status(), JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_job_is_none() {
        let (_dir, store) = store().await;
        assert!(store.get(&JobId::from("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_job_reads_as_absent_and_purges() {
        let (_dir, store) = store().await;
        let expired = job();
        let live = job();
        store.set(&expired, Duration::ZERO).await.unwrap();
        store.set(&live, DAY).await.unwrap();
        store.index_analysis_name("old", &expired.id).await.unwrap();

        assert!(store.get(&expired.id).await.unwrap().is_none());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.get(&live.id).await.unwrap().is_some());
        assert!(store.find_by_analysis_name("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_name_index_normalized_last_write_wins() {
        let (_dir, store) = store().await;
        let first = job();
        let second = job();

        store.index_analysis_name("  Audit ", &first.id).await.unwrap();
        store.index_analysis_name("AUDIT", &second.id).await.unwrap();

        let found = store.find_by_analysis_name("audit").await.unwrap();
        assert_eq!(found, Some(second.id));
        assert!(store.find_by_analysis_name("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_name_not_indexed() {
        let (_dir, store) = store().await;
        let job = job();
        store.index_analysis_name("   ", &job.id).await.unwrap();
        assert!(store.find_by_analysis_name("").await.unwrap().is_none());
    }
}
