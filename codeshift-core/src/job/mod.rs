//! Jobs: the unit of work driven through a workflow

mod result;
mod status;
mod store;

pub use result::{StepResult, StepResults, REPORT_KEY};
pub use status::JobStatus;
pub use store::{normalize_analysis_name, JobStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::changeset::FilledChangeset;
use crate::commit::CommitOutcome;
use crate::hosting::{RepositoryKind, RepositoryRef};
use crate::llm::ProviderKind;

/// Unique identifier for a job
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a caller asks for when submitting a job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    /// Repository identifier (`owner/repo`, GitLab project path, `org/project/repo`)
    pub repository: String,
    pub repository_kind: RepositoryKind,
    /// Base branch; the provider's default branch when absent
    pub branch: Option<String>,
    /// Workflow key in the catalog
    pub analysis_type: String,
    /// Free-text instructions for every step
    pub instructions: Option<String>,
    /// Model used for every step, overriding step declarations
    pub model_name: Option<String>,
    /// Explicit LLM provider; inferred from the model name when absent
    pub provider: Option<ProviderKind>,
    /// Custom analysis name, indexed for lookup and used to cache reports
    pub analysis_name: Option<String>,
    /// Stop after step 0 and surface only the report
    pub report_only: bool,
    /// Regenerate the report instead of reusing a cached one
    pub generate_new_report: bool,
}

/// A diagnostic record kept for operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub at: DateTime<Utc>,
    pub step: Option<usize>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// Mutable working set of a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobData {
    pub repository: String,
    pub repository_kind: RepositoryKind,
    pub branch: Option<String>,
    pub analysis_type: String,
    pub instructions: Option<String>,
    pub model_name: Option<String>,
    pub provider: Option<ProviderKind>,
    pub analysis_name: Option<String>,
    pub report_only: bool,
    pub generate_new_report: bool,

    /// `step_<i>_result` snapshots
    pub steps: StepResults,
    /// Accumulated report text
    pub report: Option<String>,
    /// Where the report was cached, if it was
    pub report_url: Option<String>,
    /// One-shot feedback from the last approval
    pub approval_instructions: Option<String>,
    /// Index of the step the job is paused after
    pub paused_at_step: Option<usize>,
    /// Reconciled changeset that was sent to commit
    pub filled_changeset: Option<FilledChangeset>,
    pub commit_results: Vec<CommitOutcome>,
    pub diagnostics: Vec<Diagnostic>,
}

impl JobData {
    /// Get the stored result of a step
    pub fn step_result(&self, index: usize) -> Option<&StepResult> {
        self.steps.get(index)
    }

    /// Repository handle for provider calls
    pub fn repository_ref(&self) -> RepositoryRef {
        RepositoryRef::new(self.repository_kind, self.repository.clone())
    }

    /// Cache reports only when asked to regenerate and a name identifies them
    pub fn should_cache_report(&self) -> bool {
        self.generate_new_report && self.analysis_name.is_some()
    }

    /// Reuse a cached report only when a name identifies it and no refresh was asked
    pub fn should_reuse_report(&self) -> bool {
        !self.generate_new_report && self.analysis_name.is_some()
    }
}

impl From<JobRequest> for JobData {
    fn from(request: JobRequest) -> Self {
        Self {
            repository: request.repository,
            repository_kind: request.repository_kind,
            branch: request.branch,
            analysis_type: request.analysis_type,
            instructions: request.instructions,
            model_name: request.model_name,
            provider: request.provider,
            analysis_name: request.analysis_name,
            report_only: request.report_only,
            generate_new_report: request.generate_new_report,
            ..Default::default()
        }
    }
}

/// A job record as persisted in the job store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub error_details: Option<String>,
    pub data: JobData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job in the `starting` state
    pub fn new(data: JobData) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::generate(),
            status: JobStatus::Starting,
            error_details: None,
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a new status
    pub fn set_status(&mut self, status: JobStatus) {
        tracing::info!(
            job_id = %self.id,
            from = %self.status,
            to = %status,
            "Job status transition"
        );
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Move to `failed` with a user-visible message
    pub fn fail(&mut self, details: impl Into<String>) {
        self.error_details = Some(details.into());
        self.set_status(JobStatus::Failed);
    }

    /// Append a diagnostic record
    pub fn record_diagnostic(
        &mut self,
        step: Option<usize>,
        message: impl Into<String>,
        raw: Option<String>,
    ) {
        self.data.diagnostics.push(Diagnostic {
            at: Utc::now(),
            step,
            message: message.into(),
            raw,
        });
    }
}
