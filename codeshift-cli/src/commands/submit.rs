//! Submit command - create a job and run it

use clap::Args;
use codeshift_core::{JobRequest, ProviderKind, RepositoryKind};

use super::status::print_job;
use crate::app::App;

/// Arguments for the submit command
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Repository identifier (owner/repo, group/project, org/project/repo)
    #[arg(short, long)]
    pub repo: String,

    /// Hosting provider
    #[arg(short, long, default_value = "github")]
    pub kind: RepositoryKind,

    /// Workflow to run (a key of the workflow catalog)
    #[arg(short, long)]
    pub workflow: String,

    /// Base branch (defaults to the repository's default branch)
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Instructions passed to every step
    #[arg(short, long)]
    pub instructions: Option<String>,

    /// Model for every step, overriding the workflow
    #[arg(short, long)]
    pub model: Option<String>,

    /// LLM provider (inferred from the model when omitted)
    #[arg(short, long)]
    pub provider: Option<ProviderKind>,

    /// Name to find the job and its cached report by
    #[arg(short, long)]
    pub name: Option<String>,

    /// Stop after the first step and only produce the report
    #[arg(long)]
    pub report_only: bool,

    /// Regenerate the report instead of reusing a cached one
    #[arg(long)]
    pub new_report: bool,

    /// Only create the job; start it later with `codeshift run`
    #[arg(long)]
    pub detach: bool,
}

impl SubmitArgs {
    fn request(&self) -> JobRequest {
        JobRequest {
            repository: self.repo.clone(),
            repository_kind: self.kind,
            branch: self.branch.clone(),
            analysis_type: self.workflow.clone(),
            instructions: self.instructions.clone(),
            model_name: self.model.clone(),
            provider: self.provider,
            analysis_name: self.name.clone(),
            report_only: self.report_only,
            generate_new_report: self.new_report,
        }
    }

    /// Execute the submit command
    pub async fn execute(&self, app: &App) -> anyhow::Result<()> {
        let id = app.orchestrator.submit(self.request()).await?;
        println!("Job {} submitted", id);

        if self.detach {
            println!("Start it with: codeshift run {}", id);
            return Ok(());
        }

        println!("Running workflow '{}'...", self.workflow);
        app.orchestrator.execute_workflow(&id, 0).await?;

        let job = app.orchestrator.job(&id).await?;
        println!();
        print_job(&job, false);
        Ok(())
    }
}
