//! Report cache
//!
//! Reports from step 0 can be stored and reused by later jobs that name the
//! same analysis.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::job::{normalize_analysis_name, JobData};
use crate::{Error, Result};

/// Coordinates of a cached report
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportKey {
    pub repository: String,
    pub analysis_type: String,
    pub branch: Option<String>,
    pub analysis_name: String,
}

impl ReportKey {
    /// Key for a job's report, `None` without an analysis name
    pub fn for_job(data: &JobData) -> Option<Self> {
        let name = data.analysis_name.as_deref()?;
        Some(Self {
            repository: data.repository.clone(),
            analysis_type: data.analysis_type.clone(),
            branch: data.branch.clone(),
            analysis_name: normalize_analysis_name(name),
        })
    }

    /// Relative storage path: `<repository>/<analysis_type>/<branch>/<name>.md`
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        path.push(sanitize(&self.repository));
        path.push(sanitize(&self.analysis_type));
        path.push(sanitize(self.branch.as_deref().unwrap_or("default")));
        path.push(format!("{}.md", sanitize(&self.analysis_name)));
        path
    }
}

fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    // Never produce "." or ".." as a path segment
    if cleaned.chars().all(|c| c == '.') {
        cleaned.replace('.', "_")
    } else {
        cleaned
    }
}

/// Blob storage for reports
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Read a report, `None` if it was never written
    async fn read(&self, key: &ReportKey) -> Result<Option<String>>;

    /// Store a report, returning a URL it can be fetched from
    async fn write(&self, key: &ReportKey, text: &str) -> Result<String>;
}

/// [`BlobStorage`] on the local filesystem
#[derive(Debug, Clone)]
pub struct FsReportStore {
    root: PathBuf,
}

impl FsReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &ReportKey) -> PathBuf {
        self.root.join(key.relative_path())
    }
}

#[async_trait]
impl BlobStorage for FsReportStore {
    async fn read(&self, key: &ReportKey) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                debug!(path = %path.display(), "Read cached report");
                Ok(Some(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!(
                "Failed to read report {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write(&self, key: &ReportKey, text: &str) -> Result<String> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, text).await?;
        let absolute = tokio::fs::canonicalize(&path).await?;
        debug!(path = %absolute.display(), "Wrote report");
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key() -> ReportKey {
        ReportKey {
            repository: "acme/api".to_string(),
            analysis_type: "relatorio_seguranca".to_string(),
            branch: None,
            analysis_name: "audit q3".to_string(),
        }
    }

    #[test]
    fn test_relative_path_is_sanitized() {
        let path = key().relative_path();
        assert_eq!(
            path,
            PathBuf::from("acme_api/relatorio_seguranca/default/audit_q3.md")
        );

        let tricky = ReportKey {
            branch: Some("..".to_string()),
            ..key()
        };
        assert!(!tricky.relative_path().to_string_lossy().contains(".."));
    }

    #[test]
    fn test_key_for_job() {
        let mut data = JobData {
            repository: "acme/api".to_string(),
            analysis_type: "relatorio".to_string(),
            ..Default::default()
        };
        assert!(ReportKey::for_job(&data).is_none());

        data.analysis_name = Some("  Audit ".to_string());
        assert_eq!(ReportKey::for_job(&data).unwrap().analysis_name, "audit");
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FsReportStore::new(dir.path());
        assert_eq!(store.read(&key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = FsReportStore::new(dir.path());

        let url = store.write(&key(), "# Report").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("audit_q3.md"));

        assert_eq!(store.read(&key()).await.unwrap().as_deref(), Some("# Report"));
    }
}
