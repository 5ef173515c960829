//! Jobs command - list recent jobs

use clap::Args;

use super::status::format_age;
use crate::app::App;

/// List recently updated jobs
#[derive(Args, Debug)]
pub struct JobsArgs {
    /// Maximum number of jobs to show
    #[arg(short, long, default_value = "20")]
    pub limit: u32,
}

impl JobsArgs {
    /// Execute the jobs command
    pub async fn execute(&self, app: &App) -> anyhow::Result<()> {
        let jobs = app.jobs.list_recent(self.limit).await?;

        if jobs.is_empty() {
            println!("No jobs.");
            return Ok(());
        }

        for job in &jobs {
            println!(
                "{}  {:<18} {:<14} {}  ({} ago)",
                job.id,
                job.status(),
                job.analysis_type,
                job.repository,
                format_age(job.updated_at)
            );
            if let Some(details) = &job.error_details {
                println!("    {}", details);
            }
        }
        Ok(())
    }
}
