//! Status command - show a job by id or analysis name

use chrono::{DateTime, Utc};
use clap::Args;
use codeshift_core::{Job, JobId};

use crate::app::App;

/// Show the state of a job
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Job id
    #[arg(required_unless_present = "name")]
    pub job: Option<String>,

    /// Look the job up by its analysis name instead
    #[arg(short, long, conflicts_with = "job")]
    pub name: Option<String>,

    /// Print the full job record as JSON
    #[arg(long)]
    pub json: bool,

    /// Include the report and diagnostics
    #[arg(short, long)]
    pub full: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, app: &App) -> anyhow::Result<()> {
        let id = match (&self.job, &self.name) {
            (Some(job), _) => JobId::from(job.clone()),
            (None, Some(name)) => app
                .orchestrator
                .find_by_analysis_name(name)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No job named '{}'", name))?,
            (None, None) => anyhow::bail!("Pass a job id or --name"),
        };

        let job = app.orchestrator.job(&id).await?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&job)?);
        } else {
            print_job(&job, self.full);
        }
        Ok(())
    }
}

/// Compact age like `3m`, `2h 5m` or `4d`
pub fn format_age(since: DateTime<Utc>) -> String {
    let seconds = (Utc::now() - since).num_seconds().max(0);
    match seconds {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86400 => match (s / 3600, (s % 3600) / 60) {
            (h, 0) => format!("{}h", h),
            (h, m) => format!("{}h {}m", h, m),
        },
        s => match (s / 86400, (s % 86400) / 3600) {
            (d, 0) => format!("{}d", d),
            (d, h) => format!("{}d {}h", d, h),
        },
    }
}

/// Print a human-readable job summary
pub fn print_job(job: &Job, full: bool) {
    let data = &job.data;

    println!("Job {}", job.id);
    println!("  Status: {}", job.status);
    println!("  Workflow: {}", data.analysis_type);
    println!("  Repository: {} ({})", data.repository, data.repository_kind);
    if let Some(branch) = &data.branch {
        println!("  Branch: {}", branch);
    }
    if let Some(name) = &data.analysis_name {
        println!("  Name: {}", name);
    }
    println!("  Updated: {} ago", format_age(job.updated_at));

    if let Some(details) = &job.error_details {
        println!("  Error: {}", details);
    }
    if let Some(step) = data.paused_at_step {
        println!("  Paused after step {}; approve or reject to continue", step);
    }
    if let Some(url) = &data.report_url {
        println!("  Report stored at: {}", url);
    }

    if !data.commit_results.is_empty() {
        println!();
        println!("  Branches:");
        for outcome in &data.commit_results {
            let marker = if outcome.success { "ok" } else { "FAILED" };
            println!(
                "    [{}] {} ({} files) {}",
                marker, outcome.branch_name, outcome.files_changed, outcome.message
            );
            if let Some(url) = &outcome.pr_url {
                println!("        {}", url);
            }
        }
    }

    if full {
        if let Some(report) = &data.report {
            println!();
            println!("Report");
            println!("======");
            println!("{}", report);
        }
        if !data.diagnostics.is_empty() {
            println!();
            println!("Diagnostics:");
            for diagnostic in &data.diagnostics {
                let step = diagnostic
                    .step
                    .map(|s| format!("step {}", s))
                    .unwrap_or_else(|| "job".to_string());
                println!("  {} [{}] {}", diagnostic.at.format("%H:%M:%S"), step, diagnostic.message);
            }
        }
    } else if data.report.is_some() {
        println!("  (report available; use --full to print it)");
    }
}
