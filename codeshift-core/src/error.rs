//! Error types for codeshift

use thiserror::Error;

/// Result type alias for codeshift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for codeshift operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error (workflow catalog)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Job does not exist in the store
    #[error("Job {0} not found")]
    JobNotFound(String),

    /// Workflow key is not declared in the catalog
    #[error("Workflow '{0}' is not defined")]
    UnknownWorkflow(String),

    /// Step declares an agent type outside the closed set
    #[error("Unknown agent type: {0}")]
    UnknownAgentType(String),

    /// Action is not valid for the job's current status
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Agent execution error
    #[error("Agent error: {0}")]
    Agent(String),

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Repository hosting provider error
    #[error("Hosting error: {0}")]
    Hosting(String),

    /// Job store or report storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Collaborator exceeded the configured deadline
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Agent output could not be used as a step result
    #[error("Invalid agent output: {0}")]
    InvalidOutput(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error comes from static configuration rather than runtime data
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::UnknownWorkflow(_) | Error::UnknownAgentType(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Llm(err.to_string())
    }
}
