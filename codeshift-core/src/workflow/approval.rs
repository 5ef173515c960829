//! Human approval gate
//!
//! A job paused at an approval gate sits in `pending_approval` with the
//! paused step index stored. Approving resumes it at the next step in the
//! background; rejecting ends it.

use tokio::task::JoinHandle;
use tracing::info;

use super::Orchestrator;
use crate::job::{JobId, JobStatus};
use crate::{Error, Result};

/// Result of an approval
#[derive(Debug)]
pub enum ApprovalOutcome {
    /// Execution resumed in the background
    Resumed {
        from_step: usize,
        task: JoinHandle<()>,
    },
    /// The job had already completed; nothing to do
    AlreadyCompleted,
}

/// Result of a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectOutcome {
    Rejected,
    /// The job had already completed; nothing to do
    AlreadyCompleted,
}

fn not_pending(id: &JobId, status: &JobStatus) -> Error {
    Error::Conflict(format!(
        "Job {} is {}, not pending approval",
        id, status
    ))
}

impl Orchestrator {
    /// Approve a paused job, optionally with feedback for the next step
    pub async fn approve(&self, id: &JobId, feedback: Option<String>) -> Result<ApprovalOutcome> {
        let mut job = self.job(id).await?;

        match job.status {
            JobStatus::PendingApproval => {}
            JobStatus::Completed => return Ok(ApprovalOutcome::AlreadyCompleted),
            ref other => return Err(not_pending(id, other)),
        }

        let paused = job.data.paused_at_step.ok_or_else(|| {
            Error::Conflict(format!("Job {} is pending approval without a paused step", id))
        })?;

        job.data.approval_instructions = feedback.filter(|f| !f.trim().is_empty());
        job.data.paused_at_step = None;
        job.set_status(JobStatus::WorkflowStarted);
        self.persist(&job).await?;

        let from_step = paused + 1;
        info!(
            job_id = %id,
            from_step,
            with_feedback = job.data.approval_instructions.is_some(),
            "Job approved"
        );

        let task = self.spawn(job.id.clone(), from_step);
        Ok(ApprovalOutcome::Resumed { from_step, task })
    }

    /// Reject a paused job
    pub async fn reject(&self, id: &JobId) -> Result<RejectOutcome> {
        let mut job = self.job(id).await?;

        match job.status {
            JobStatus::PendingApproval => {}
            JobStatus::Completed => return Ok(RejectOutcome::AlreadyCompleted),
            ref other => return Err(not_pending(id, other)),
        }

        job.set_status(JobStatus::Rejected);
        self.persist(&job).await?;
        info!(job_id = %id, "Job rejected");
        Ok(RejectOutcome::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;

    async fn paused_job(h: &Harness) -> JobId {
        h.openai.push(r#"{"relatorio": "draft"}"#);
        let id = h.submit(Harness::request("relatorio_aprovado")).await;
        let status = h.orchestrator.execute_workflow(&id, 0).await.unwrap();
        assert_eq!(status, JobStatus::PendingApproval);
        id
    }

    #[tokio::test]
    async fn test_reject_pending_job() {
        let h = Harness::new();
        let id = paused_job(&h).await;

        let outcome = h.orchestrator.reject(&id).await.unwrap();
        assert_eq!(outcome, RejectOutcome::Rejected);
        assert_eq!(h.job(&id).status, JobStatus::Rejected);
        assert_eq!(h.openai.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_completed_job_is_noop() {
        let h = Harness::new();
        h.openai.push(r#"{"relatorio": "done"}"#);
        let mut request = Harness::request("relatorio");
        request.report_only = true;
        let id = h.submit(request).await;
        h.orchestrator.execute_workflow(&id, 0).await.unwrap();

        assert!(matches!(
            h.orchestrator.approve(&id, None).await.unwrap(),
            ApprovalOutcome::AlreadyCompleted
        ));
        assert_eq!(
            h.orchestrator.reject(&id).await.unwrap(),
            RejectOutcome::AlreadyCompleted
        );
        assert_eq!(h.job(&id).status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_not_pending_is_conflict() {
        let h = Harness::new();
        let id = h.submit(Harness::request("relatorio_aprovado")).await;

        let approve = h.orchestrator.approve(&id, None).await;
        assert!(matches!(approve, Err(Error::Conflict(_))));
        let reject = h.orchestrator.reject(&id).await;
        assert!(matches!(reject, Err(Error::Conflict(_))));
        assert_eq!(h.job(&id).status, JobStatus::Starting);
    }

    #[tokio::test]
    async fn test_rejected_job_cannot_be_approved() {
        let h = Harness::new();
        let id = paused_job(&h).await;
        h.orchestrator.reject(&id).await.unwrap();

        let result = h.orchestrator.approve(&id, None).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_rejected_job_does_not_run_again() {
        let h = Harness::new();
        let id = paused_job(&h).await;
        h.orchestrator.reject(&id).await.unwrap();
        h.openai.push(r#"{"relatorio": "should not be used"}"#);

        let result = h.orchestrator.execute_workflow(&id, 1).await;
        assert!(matches!(result, Err(Error::Conflict(_))));

        let job = h.job(&id);
        assert_eq!(job.status, JobStatus::Rejected);
        assert!(job.data.step_result(1).is_none());
        assert_eq!(h.openai.requests().len(), 1);
        assert!(h.hosting.reviews().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job_not_found() {
        let h = Harness::new();
        let id = JobId::from("missing");
        assert!(matches!(
            h.orchestrator.approve(&id, None).await,
            Err(Error::JobNotFound(_))
        ));
        assert!(matches!(
            h.orchestrator.reject(&id).await,
            Err(Error::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_feedback_is_dropped() {
        let h = Harness::new();
        let id = paused_job(&h).await;
        h.openai.push(r#"{"relatorio": "final"}"#);

        let outcome = h
            .orchestrator
            .approve(&id, Some("   ".to_string()))
            .await
            .unwrap();
        let ApprovalOutcome::Resumed { task, .. } = outcome else {
            panic!("expected the job to resume");
        };
        task.await.unwrap();

        let prompt = &h.openai.requests()[1].prompt;
        assert!(!prompt.contains(crate::agent::APPROVAL_FEEDBACK_KEY));
        assert_eq!(h.job(&id).status, JobStatus::Completed);
    }
}
