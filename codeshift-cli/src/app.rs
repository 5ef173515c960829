//! Wiring the orchestrator from configuration

use std::sync::Arc;

use anyhow::Context;
use codeshift_core::llm::{ClaudeProvider, OpenAiProvider, PromptLibrary};
use codeshift_core::{
    Config, FsReportStore, Orchestrator, OrchestratorSettings, ProviderRegistry, Secrets,
    WorkflowCatalog,
};
use codeshift_db::{Database, SqliteJobStore};
use codeshift_hosting::{build_registry, HostingTokens};
use tracing::{debug, info, warn};

/// Everything a command needs
pub struct App {
    pub config: Config,
    pub orchestrator: Orchestrator,
    pub jobs: SqliteJobStore,
}

impl App {
    /// Open the job database and build the orchestrator
    pub async fn open(config: Config) -> anyhow::Result<Self> {
        let workflows_path = config.workflows_path()?;
        let catalog = WorkflowCatalog::load(&workflows_path)
            .with_context(|| format!("Failed to load workflows from {}", workflows_path.display()))?;
        for problem in catalog.validate() {
            warn!(problem = %problem, "Workflow catalog problem");
        }

        let secrets = Secrets::load().context("Failed to load secrets")?;

        let db_path = config.database_path()?;
        let db = Database::new(&db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        let jobs = db.jobs();
        let purged = jobs.purge_expired().await?;
        if purged > 0 {
            info!(purged, "Removed expired jobs");
        }

        let llm = provider_registry(&config, &secrets);
        let hosting = build_registry(&config.hosting, &HostingTokens::from_secrets(&secrets))?;
        let reports = FsReportStore::new(config.reports_dir()?);

        debug!(
            workflows = %workflows_path.display(),
            database = %db_path.display(),
            "Application wired"
        );

        let orchestrator = Orchestrator::new(
            Arc::new(jobs.clone()),
            Arc::new(catalog),
            hosting,
            llm,
            Arc::new(reports),
            OrchestratorSettings::from_config(&config),
        );

        Ok(Self {
            config,
            orchestrator,
            jobs,
        })
    }
}

fn provider_registry(config: &Config, secrets: &Secrets) -> ProviderRegistry {
    let prompts = match &config.llm.prompts_dir {
        Some(dir) => PromptLibrary::from_dir(dir),
        None => PromptLibrary::embedded(),
    };
    let mut registry = ProviderRegistry::new();

    match secrets.openai_api_key() {
        Some(key) => registry.register(Arc::new(
            OpenAiProvider::new(key)
                .with_base_url(&config.llm.openai_base_url)
                .with_model(&config.llm.openai_model)
                .with_prompts(prompts.clone()),
        )),
        None => warn!("No OpenAI API key configured (OPENAI_API_KEY or secrets file)"),
    }

    match secrets.anthropic_api_key() {
        Some(key) => registry.register(Arc::new(
            ClaudeProvider::new(key)
                .with_base_url(&config.llm.anthropic_base_url)
                .with_model(&config.llm.claude_model)
                .with_prompts(prompts),
        )),
        None => warn!("No Anthropic API key configured (ANTHROPIC_API_KEY or secrets file)"),
    }

    registry
}
