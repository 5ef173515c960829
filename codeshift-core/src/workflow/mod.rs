//! Workflow definitions and the orchestrator that runs them

mod approval;
mod definition;
mod orchestrator;

pub use approval::{ApprovalOutcome, RejectOutcome};
pub use definition::{Step, StepParams, WorkflowCatalog, WorkflowDefinition};
pub use orchestrator::{Orchestrator, OrchestratorSettings, Stage};
