//! Workflow orchestrator
//!
//! Drives a job through its workflow's steps. Suspension is "persist and
//! return": an approval gate stores the paused step index and returns, and
//! resuming is another call to [`Orchestrator::execute_workflow`] starting
//! at the next step. Every status transition is persisted before the work
//! it announces, so a restarted process can pick a job up from the store.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{Step, WorkflowCatalog, WorkflowDefinition};
use crate::agent::{self, parse_output, ParsedOutput, StepContext};
use crate::changeset::reconcile;
use crate::commit::{ChainedCommitter, CommitProcessor};
use crate::config::Config;
use crate::hosting::{HostedRepositoryReader, HostingRegistry, RepositoryKind, RepositoryReader};
use crate::job::{Job, JobId, JobRequest, JobStatus, JobStore, StepResult};
use crate::llm::ProviderRegistry;
use crate::report::{BlobStorage, ReportKey};
use crate::{Error, Result};

/// Tunables taken from configuration
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Time to live refreshed on every job write
    pub job_ttl: Duration,
    /// Deadline for a single agent invocation
    pub step_timeout: Option<Duration>,
    /// Model for steps that name none and jobs without an override
    pub default_model: Option<String>,
    /// Token limit for steps that set none
    pub max_tokens: u32,
    /// Base branch when neither the job nor the provider gives one
    pub default_branch: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            job_ttl: config.storage.job_ttl,
            step_timeout: config.llm.step_timeout,
            default_model: config.llm.default_model.clone(),
            max_tokens: config.llm.max_tokens,
            default_branch: config.hosting.default_branch.clone(),
        }
    }
}

/// Where in the run an error happened, used in `error_details`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Step { index: usize, label: String },
    Finalizing,
    Committing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Loading => write!(f, "workflow setup"),
            Stage::Step { index, label } => write!(f, "step {} ({})", index, label),
            Stage::Finalizing => write!(f, "changeset reconciliation"),
            Stage::Committing => write!(f, "commit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Drives jobs through their workflows
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    catalog: Arc<WorkflowCatalog>,
    hosting: HostingRegistry,
    llm: ProviderRegistry,
    reports: Arc<dyn BlobStorage>,
    commits: Arc<dyn CommitProcessor>,
    settings: OrchestratorSettings,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("workflows", &self.catalog.workflows.len())
            .field("hosting", &self.hosting)
            .field("llm", &self.llm)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator committing through a [`ChainedCommitter`]
    pub fn new(
        store: Arc<dyn JobStore>,
        catalog: Arc<WorkflowCatalog>,
        hosting: HostingRegistry,
        llm: ProviderRegistry,
        reports: Arc<dyn BlobStorage>,
        settings: OrchestratorSettings,
    ) -> Self {
        let commits = Arc::new(ChainedCommitter::new(hosting.clone()));
        Self {
            store,
            catalog,
            hosting,
            llm,
            reports,
            commits,
            settings,
        }
    }

    /// Replace the commit processor
    pub fn with_commit_processor(mut self, commits: Arc<dyn CommitProcessor>) -> Self {
        self.commits = commits;
        self
    }

    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    /// Create and persist a job in the `starting` state
    ///
    /// Indexes the analysis name, if any, so the job can be found by it.
    pub async fn submit(&self, request: JobRequest) -> Result<JobId> {
        self.catalog.get(&request.analysis_type)?;

        let job = Job::new(request.into());
        self.persist(&job).await?;

        if let Some(name) = job.data.analysis_name.as_deref() {
            self.store.index_analysis_name(name, &job.id).await?;
        }

        info!(
            job_id = %job.id,
            workflow = %job.data.analysis_type,
            repository = %job.data.repository,
            "Job submitted"
        );
        Ok(job.id)
    }

    /// Load a job
    pub async fn job(&self, id: &JobId) -> Result<Job> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Error::JobNotFound(id.to_string()))
    }

    /// Resolve a custom analysis name to its job
    pub async fn find_by_analysis_name(&self, name: &str) -> Result<Option<JobId>> {
        self.store.find_by_analysis_name(name).await
    }

    /// Run [`execute_workflow`](Self::execute_workflow) in the background
    pub fn spawn(&self, id: JobId, start_from_step: usize) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.execute_workflow(&id, start_from_step).await {
                error!(job_id = %id, error = %e, "Workflow execution could not run");
            }
        })
    }

    /// Drive a job from `start_from_step` until it pauses, completes or fails
    ///
    /// Failures inside the workflow are recorded on the job as `failed` and
    /// returned as `Ok(JobStatus::Failed)`. An `Err` means the job could not
    /// be loaded or its failure could not be persisted.
    pub async fn execute_workflow(&self, id: &JobId, start_from_step: usize) -> Result<JobStatus> {
        let mut job = self.job(id).await?;
        if job.status == JobStatus::Rejected {
            warn!(job_id = %id, "Refusing to run a rejected job");
            return Err(Error::Conflict(format!(
                "Job {} was rejected and cannot run again",
                id
            )));
        }
        let mut stage = Stage::Loading;

        info!(job_id = %id, start_from_step, "Executing workflow");

        match self.drive(&mut job, start_from_step, &mut stage).await {
            Ok(()) => Ok(job.status.clone()),
            Err(e) => {
                error!(job_id = %id, stage = %stage, error = %e, "Workflow failed");
                job.fail(format!("Error in {}: {}", stage, e));
                self.persist(&job).await?;
                Ok(JobStatus::Failed)
            }
        }
    }

    async fn drive(&self, job: &mut Job, start_from_step: usize, stage: &mut Stage) -> Result<()> {
        let catalog = Arc::clone(&self.catalog);
        let workflow = catalog.get(&job.data.analysis_type)?;

        if start_from_step > workflow.steps.len() {
            return Err(Error::Config(format!(
                "Cannot start at step {}: workflow '{}' has {} steps",
                start_from_step,
                job.data.analysis_type,
                workflow.steps.len()
            )));
        }

        let reader = self.reader_for(job.data.repository_kind)?;

        let mut previous = start_from_step
            .checked_sub(1)
            .and_then(|i| job.data.step_result(i).cloned())
            .unwrap_or_default();

        for (index, step) in workflow.steps.iter().enumerate().skip(start_from_step) {
            let label = step.status_label(index);
            *stage = Stage::Step {
                index,
                label: label.clone(),
            };
            job.set_status(JobStatus::Step(label));
            self.persist(job).await?;

            if index == 0 {
                if let Some(text) = self.cached_report(job).await {
                    info!(job_id = %job.id, "Reusing stored report");
                    let result = StepResult::report(text);
                    job.data.steps.insert(index, result.clone());
                    self.persist(job).await?;

                    if self.after_step(job, step, index, &result).await? == Flow::Stop {
                        return Ok(());
                    }
                    previous = result;
                    continue;
                }
            }

            let result = self
                .run_step(job, step, index, &previous, reader.as_ref())
                .await?;
            job.data.steps.insert(index, result.clone());
            self.persist(job).await?;

            if self.after_step(job, step, index, &result).await? == Flow::Stop {
                return Ok(());
            }
            previous = result;
        }

        *stage = Stage::Finalizing;
        self.finalize(job, workflow, stage).await
    }

    fn reader_for(&self, kind: RepositoryKind) -> Result<Arc<dyn RepositoryReader>> {
        let client = self.hosting.get(kind)?;
        let extensions = Arc::new(self.catalog.extensions.clone());
        Ok(Arc::new(HostedRepositoryReader::new(client, extensions)))
    }

    /// Previously stored report for this job's analysis name
    ///
    /// Storage errors count as "not found".
    async fn cached_report(&self, job: &Job) -> Option<String> {
        if !job.data.should_reuse_report() {
            return None;
        }
        let key = ReportKey::for_job(&job.data)?;
        match self.reports.read(&key).await {
            Ok(Some(text)) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Report storage read failed, regenerating");
                None
            }
        }
    }

    async fn run_step(
        &self,
        job: &mut Job,
        step: &Step,
        index: usize,
        previous: &StepResult,
        reader: &dyn RepositoryReader,
    ) -> Result<StepResult> {
        let kind = step.agent_kind()?;

        // Approval feedback applies to exactly one step
        let feedback = job.data.approval_instructions.take();

        let model = job
            .data
            .model_name
            .clone()
            .or_else(|| step.model_name.clone())
            .or_else(|| self.settings.default_model.clone());
        let provider = self.llm.resolve(job.data.provider, model.as_deref())?;

        let ctx = StepContext {
            job: &job.data,
            step,
            index,
            previous,
            approval_feedback: feedback.as_deref(),
            model_name: model.as_deref(),
            default_max_tokens: self.settings.max_tokens,
        };
        let input = agent::strategy_for(kind).build_input(&ctx)?;

        info!(
            job_id = %job.id,
            step = index,
            agent = %kind,
            provider = %provider.kind(),
            model = model.as_deref().unwrap_or("default"),
            "Running step"
        );

        let call = agent::invoke(&input, reader, provider.as_ref());
        let response = match self.settings.step_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Error::Timeout(limit))??,
            None => call.await?,
        };

        job.record_diagnostic(
            Some(index),
            format!(
                "{} via {}: {} tokens in, {} tokens out",
                kind,
                provider.kind(),
                response.tokens_in,
                response.tokens_out
            ),
            None,
        );

        match parse_output(&response.text) {
            ParsedOutput::Json(value) => Ok(StepResult::from_value(value)),
            ParsedOutput::Empty => {
                if previous.is_empty() {
                    return Err(Error::InvalidOutput(
                        "agent returned empty output and there is no previous result".to_string(),
                    ));
                }
                warn!(job_id = %job.id, step = index, "Empty agent output, reusing previous result");
                job.record_diagnostic(
                    Some(index),
                    "Empty agent output; reused previous result",
                    None,
                );
                Ok(previous.clone())
            }
            ParsedOutput::Malformed(e) => {
                job.record_diagnostic(
                    Some(index),
                    format!("Agent output is not valid JSON: {}", e),
                    Some(response.text.clone()),
                );
                if previous.is_empty() {
                    return Err(Error::InvalidOutput(format!(
                        "agent output is not valid JSON: {}",
                        e
                    )));
                }
                warn!(job_id = %job.id, step = index, error = %e, "Malformed agent output, reusing previous result");
                Ok(previous.clone())
            }
        }
    }

    /// Report-only completion and approval gates
    async fn after_step(
        &self,
        job: &mut Job,
        step: &Step,
        index: usize,
        result: &StepResult,
    ) -> Result<Flow> {
        if index == 0 && job.data.report_only {
            self.publish_report(job, result).await;
            job.set_status(JobStatus::Completed);
            self.persist(job).await?;
            info!(job_id = %job.id, "Report-only job completed");
            return Ok(Flow::Stop);
        }

        if step.requires_approval {
            self.publish_report(job, result).await;
            job.data.paused_at_step = Some(index);
            job.set_status(JobStatus::PendingApproval);
            self.persist(job).await?;
            info!(job_id = %job.id, step = index, "Waiting for approval");
            return Ok(Flow::Stop);
        }

        Ok(Flow::Continue)
    }

    /// Store the report text on the job and, when asked to, in report storage
    async fn publish_report(&self, job: &mut Job, result: &StepResult) {
        let text = result.report_or_pretty();

        if job.data.should_cache_report() {
            if let Some(key) = ReportKey::for_job(&job.data) {
                match self.reports.write(&key, &text).await {
                    Ok(url) => job.data.report_url = Some(url),
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "Failed to store report");
                        job.record_diagnostic(None, format!("Failed to store report: {}", e), None);
                    }
                }
            }
        }

        job.data.report = Some(text);
    }

    async fn finalize(
        &self,
        job: &mut Job,
        workflow: &WorkflowDefinition,
        stage: &mut Stage,
    ) -> Result<()> {
        let steps = workflow.steps.len();
        let (refactor, grouping) = match steps {
            0 => (None, None),
            1 => (job.data.step_result(0), job.data.step_result(0)),
            n => (job.data.step_result(n - 2), job.data.step_result(n - 1)),
        };
        let refactor = refactor.map(|r| r.value().clone());
        let grouping = grouping.map(|r| r.value().clone());

        job.set_status(JobStatus::PopulatingData);
        self.persist(job).await?;

        let reconciliation = reconcile(grouping.as_ref(), refactor.as_ref());
        for dropped in &reconciliation.dropped {
            job.record_diagnostic(None, format!("Dropped change: {}", dropped), None);
        }

        let plans = reconciliation.changeset.branch_plans();
        info!(
            job_id = %job.id,
            branches = plans.len(),
            files = reconciliation.changeset.change_count(),
            dropped = reconciliation.dropped.len(),
            "Changeset reconciled"
        );
        job.data.filled_changeset = Some(reconciliation.changeset);

        if plans.is_empty() {
            warn!(job_id = %job.id, "Nothing to commit");
            job.record_diagnostic(None, "Reconciled changeset is empty; nothing to commit", None);
            job.set_status(JobStatus::Completed);
            return self.persist(job).await;
        }

        *stage = Stage::Committing;
        job.set_status(JobStatus::Committing);
        self.persist(job).await?;

        let base_branch = self.base_branch(job).await;
        let outcomes = self
            .commits
            .apply(&job.data.repository_ref(), &base_branch, &plans)
            .await?;

        let failed = outcomes.iter().filter(|o| !o.success).count();
        if failed > 0 {
            job.record_diagnostic(
                None,
                format!("{} of {} branches failed to commit", failed, outcomes.len()),
                None,
            );
        }
        job.data.commit_results = outcomes;

        job.set_status(JobStatus::Completed);
        self.persist(job).await
    }

    async fn base_branch(&self, job: &Job) -> String {
        if let Some(branch) = job.data.branch.as_deref().filter(|b| !b.is_empty()) {
            return branch.to_string();
        }

        let lookup = match self.hosting.get(job.data.repository_kind) {
            Ok(client) => client.default_branch(&job.data.repository).await,
            Err(e) => Err(e),
        };
        match lookup {
            Ok(branch) if !branch.is_empty() => branch,
            Ok(_) => self.settings.default_branch.clone(),
            Err(e) => {
                warn!(
                    job_id = %job.id,
                    error = %e,
                    fallback = %self.settings.default_branch,
                    "Could not resolve default branch"
                );
                self.settings.default_branch.clone()
            }
        }
    }

    pub(crate) async fn persist(&self, job: &Job) -> Result<()> {
        self.store.set(job, self.settings.job_ttl).await
    }
}
