//! Run command - execute or resume a stored job

use clap::Args;
use codeshift_core::{Job, JobId, JobStatus};

use super::status::print_job;
use crate::app::App;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Job id
    pub job: String,

    /// Step to start from (defaults to the first step without a result)
    #[arg(long)]
    pub from_step: Option<usize>,
}

/// First step without a stored result
fn resume_point(job: &Job) -> usize {
    job.data
        .steps
        .iter()
        .map(|(index, _)| index)
        .max()
        .map_or(0, |index| index + 1)
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, app: &App) -> anyhow::Result<()> {
        let id = JobId::from(self.job.clone());
        let job = app.orchestrator.job(&id).await?;

        if job.status == JobStatus::Rejected {
            anyhow::bail!("Job {} was rejected at an approval gate and cannot run again", id);
        }

        if job.status == JobStatus::PendingApproval && self.from_step.is_none() {
            anyhow::bail!(
                "Job {} is waiting for approval; use `codeshift approve {}` or pass --from-step",
                id,
                id
            );
        }

        let start = self.from_step.unwrap_or_else(|| resume_point(&job));
        tracing::info!(job_id = %id, start, "Running job");
        println!("Running job {} from step {}...", id, start);

        app.orchestrator.execute_workflow(&id, start).await?;

        let job = app.orchestrator.job(&id).await?;
        println!();
        print_job(&job, false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeshift_core::{JobRequest, StepResult};

    #[test]
    fn test_resume_point() {
        let mut job = Job::new(JobRequest::default().into());
        assert_eq!(resume_point(&job), 0);

        job.data.steps.insert(0, StepResult::report("R"));
        job.data.steps.insert(1, StepResult::report("S"));
        assert_eq!(resume_point(&job), 2);
    }
}
