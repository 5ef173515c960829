//! Job status vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a job
///
/// Besides the fixed lifecycle states, a running job carries the
/// `status_update` label of the step it is executing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    /// Created, not yet picked up
    Starting,
    /// Resumed after approval, waiting for the next step to start
    WorkflowStarted,
    /// Executing a step, labelled by the step's `status_update`
    Step(String),
    /// Suspended until a human approves or rejects
    PendingApproval,
    /// Reconciling the refactor and grouping results
    PopulatingData,
    /// Applying commits and opening pull requests
    Committing,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Rejected at an approval gate
    Rejected,
}

impl JobStatus {
    /// Get the wire name of this status
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::WorkflowStarted => "workflow_started",
            JobStatus::Step(label) => label,
            JobStatus::PendingApproval => "pending_approval",
            JobStatus::PopulatingData => "populating_data",
            JobStatus::Committing => "committing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Rejected => "rejected",
        }
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Rejected
        )
    }

    /// Check if the job is waiting at an approval gate
    pub fn is_pending_approval(&self) -> bool {
        matches!(self, JobStatus::PendingApproval)
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "starting" => JobStatus::Starting,
            "workflow_started" => JobStatus::WorkflowStarted,
            "pending_approval" => JobStatus::PendingApproval,
            "populating_data" => JobStatus::PopulatingData,
            "committing" => JobStatus::Committing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "rejected" => JobStatus::Rejected,
            _ => JobStatus::Step(value),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(value: &str) -> Self {
        JobStatus::from(value.to_string())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Step(label) => label,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_statuses_parse() {
        assert_eq!(JobStatus::from("pending_approval"), JobStatus::PendingApproval);
        assert_eq!(JobStatus::from("completed"), JobStatus::Completed);
        assert_eq!(JobStatus::from("workflow_started"), JobStatus::WorkflowStarted);
    }

    #[test]
    fn test_step_labels_pass_through() {
        let status = JobStatus::from("gerando_relatorio");
        assert_eq!(status, JobStatus::Step("gerando_relatorio".to_string()));
        assert_eq!(status.to_string(), "gerando_relatorio");
    }

    #[test]
    fn test_serde_as_plain_string() {
        let json = serde_json::to_string(&JobStatus::PopulatingData).unwrap();
        assert_eq!(json, "\"populating_data\"");
        let parsed: JobStatus = serde_json::from_str("\"refatorando\"").unwrap();
        assert_eq!(parsed, JobStatus::Step("refatorando".to_string()));
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Rejected.is_terminal());
        assert!(!JobStatus::PendingApproval.is_terminal());
        assert!(!JobStatus::Step("x".into()).is_terminal());
    }
}
