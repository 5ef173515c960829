//! Job persistence boundary

use async_trait::async_trait;
use std::time::Duration;

use super::{Job, JobId};
use crate::Result;

/// Durable key-value store for job state
///
/// Implementations must give read-your-writes consistency for a single job
/// id. They do not serialize concurrent executions of the same job; callers
/// must not run one job twice at the same time.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load a job, `None` if absent or expired
    async fn get(&self, id: &JobId) -> Result<Option<Job>>;

    /// Write the full job record, refreshing its time to live
    async fn set(&self, job: &Job, ttl: Duration) -> Result<()>;

    /// Point an analysis name at a job; last write wins
    async fn index_analysis_name(&self, name: &str, id: &JobId) -> Result<()>;

    /// Resolve an analysis name to the job that last claimed it
    async fn find_by_analysis_name(&self, name: &str) -> Result<Option<JobId>>;
}

/// Names are matched case-insensitively and without surrounding whitespace
pub fn normalize_analysis_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_analysis_name() {
        assert_eq!(normalize_analysis_name("  Security Audit "), "security audit");
        assert_eq!(normalize_analysis_name("abc"), "abc");
    }
}
