//! Approve and reject commands for jobs paused at an approval gate

use clap::Args;
use codeshift_core::{ApprovalOutcome, JobId, RejectOutcome};

use super::status::print_job;
use crate::app::App;

/// Arguments for the approve command
#[derive(Args, Debug)]
pub struct ApproveArgs {
    /// Job id
    pub job: String,

    /// Feedback passed to the next step
    #[arg(short, long)]
    pub feedback: Option<String>,
}

impl ApproveArgs {
    /// Execute the approve command
    pub async fn execute(&self, app: &App) -> anyhow::Result<()> {
        let id = JobId::from(self.job.clone());

        match app.orchestrator.approve(&id, self.feedback.clone()).await? {
            ApprovalOutcome::AlreadyCompleted => {
                println!("Job {} has already completed", id);
            }
            ApprovalOutcome::Resumed { from_step, task } => {
                println!("Job {} approved, resuming at step {}...", id, from_step);
                task.await?;

                let job = app.orchestrator.job(&id).await?;
                println!();
                print_job(&job, false);
            }
        }
        Ok(())
    }
}

/// Arguments for the reject command
#[derive(Args, Debug)]
pub struct RejectArgs {
    /// Job id
    pub job: String,
}

impl RejectArgs {
    /// Execute the reject command
    pub async fn execute(&self, app: &App) -> anyhow::Result<()> {
        let id = JobId::from(self.job.clone());

        match app.orchestrator.reject(&id).await? {
            RejectOutcome::Rejected => println!("Job {} rejected", id),
            RejectOutcome::AlreadyCompleted => println!("Job {} has already completed", id),
        }
        Ok(())
    }
}
