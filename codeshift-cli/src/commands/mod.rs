//! CLI command implementations

pub mod approve;
pub mod jobs;
pub mod run;
pub mod status;
pub mod submit;
pub mod workflows;

pub use approve::{ApproveArgs, RejectArgs};
pub use jobs::JobsArgs;
pub use run::RunArgs;
pub use status::StatusArgs;
pub use submit::SubmitArgs;
pub use workflows::WorkflowsArgs;
