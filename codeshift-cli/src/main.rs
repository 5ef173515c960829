//! codeshift CLI - run AI refactoring workflows against hosted repositories

mod app;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use codeshift_core::{Config, Secrets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use commands::{
    ApproveArgs, JobsArgs, RejectArgs, RunArgs, StatusArgs, SubmitArgs, WorkflowsArgs,
};

/// codeshift: AI refactoring workflows with stacked pull requests
#[derive(Parser, Debug)]
#[command(name = "codeshift")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/codeshift/config.toml)
    #[arg(long, global = true, env = "CODESHIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Workflow catalog (overrides config and env)
    #[arg(long, global = true)]
    workflows: Option<PathBuf>,

    /// Job database (overrides config and env)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Create a job and run its workflow
    #[command(visible_alias = "s")]
    Submit(SubmitArgs),

    /// Run or resume a stored job
    #[command(visible_alias = "resume")]
    Run(RunArgs),

    /// Approve a job waiting at an approval gate
    Approve(ApproveArgs),

    /// Reject a job waiting at an approval gate
    Reject(RejectArgs),

    /// Show a job
    #[command(visible_alias = "st")]
    Status(StatusArgs),

    /// List recent jobs
    #[command(visible_alias = "ls")]
    Jobs(JobsArgs),

    /// List configured workflows
    Workflows(WorkflowsArgs),

    /// Show current configuration
    Config {
        /// Write a secrets file template if none exists
        #[arg(long)]
        init_secrets: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn show_config(config: &Config, init_secrets: bool) -> anyhow::Result<()> {
    println!("codeshift Configuration");
    println!("=======================");
    println!();
    println!("Workflows: {}", config.workflows_path()?.display());
    println!("Database: {}", config.database_path()?.display());
    println!("Reports: {}", config.reports_dir()?.display());
    println!("Job TTL: {}", humanize(config.storage.job_ttl));
    println!();
    println!("LLM Settings:");
    println!("  default_model: {}", config.llm.default_model.as_deref().unwrap_or("(per provider)"));
    println!("  openai_model: {}", config.llm.openai_model);
    println!("  claude_model: {}", config.llm.claude_model);
    println!("  max_tokens: {}", config.llm.max_tokens);
    match config.llm.step_timeout {
        Some(limit) => println!("  step_timeout: {}", humanize(limit)),
        None => println!("  step_timeout: (none)"),
    }
    println!();
    println!("Hosting:");
    println!("  gitlab_url: {}", config.hosting.gitlab_url);
    println!("  azure_org_url: {}", config.hosting.azure_org_url.as_deref().unwrap_or("(unset)"));
    println!("  default_branch: {}", config.hosting.default_branch);
    println!();

    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }

    if init_secrets {
        let path = Secrets::create_template()?;
        println!("Secrets file: {}", path.display());
    } else if let Some(path) = Secrets::default_secrets_path() {
        println!("Secrets file: {}", path.display());
        if !path.exists() {
            println!("  (not found - create one with `codeshift config --init-secrets`)");
        }
    }
    Ok(())
}

fn humanize(duration: std::time::Duration) -> String {
    humantime_serde::re::humantime::format_duration(duration).to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load_with_overrides(
        cli.config.clone(),
        cli.workflows.clone(),
        cli.database.clone(),
    )?;

    let command = match cli.command {
        Some(Commands::Version) => {
            println!("codeshift {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(Commands::Config { init_secrets }) => return show_config(&config, init_secrets),
        Some(command) => command,
        None => {
            println!("codeshift - AI refactoring workflows with stacked pull requests");
            println!();
            println!("Use --help for usage information");
            return Ok(());
        }
    };

    let app = App::open(config).await?;

    match command {
        Commands::Submit(args) => args.execute(&app).await?,
        Commands::Run(args) => args.execute(&app).await?,
        Commands::Approve(args) => args.execute(&app).await?,
        Commands::Reject(args) => args.execute(&app).await?,
        Commands::Status(args) => args.execute(&app).await?,
        Commands::Jobs(args) => args.execute(&app).await?,
        Commands::Workflows(args) => args.execute(&app)?,
        Commands::Version | Commands::Config { .. } => {}
    }

    Ok(())
}
