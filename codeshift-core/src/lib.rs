//! codeshift core - workflow orchestration for AI refactoring jobs
//!
//! A job runs a YAML-declared pipeline of agent steps against a repository,
//! can pause for human approval between steps, and ends either with a
//! report or with reconciled changes committed as stacked pull requests.

pub mod agent;
pub mod changeset;
pub mod commit;
pub mod config;
pub mod error;
pub mod hosting;
pub mod job;
pub mod llm;
pub mod report;
pub mod secrets;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use changeset::{reconcile, BranchChangeset, ChangeStatus, FileChange, FilledChangeset};
pub use commit::{ChainedCommitter, CommitOutcome, CommitProcessor};
pub use config::Config;
pub use error::{Error, Result};
pub use hosting::{
    ExtensionTable, HostedRepositoryReader, HostingClient, HostingRegistry, RepositoryKind,
    RepositoryReader, RepositoryRef, ReviewRequest,
};
pub use job::{Job, JobId, JobRequest, JobStatus, JobStore, StepResult};
pub use llm::{LlmProvider, LlmRequest, LlmResponse, ProviderKind, ProviderRegistry};
pub use report::{BlobStorage, FsReportStore, ReportKey};
pub use secrets::Secrets;
pub use workflow::{
    ApprovalOutcome, Orchestrator, OrchestratorSettings, RejectOutcome, WorkflowCatalog,
};
