//! Error types for hosting operations

use thiserror::Error;

/// Result type for hosting operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur talking to a hosting provider
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("{provider} request failed with status {status}: {body}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    /// Authentication error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Repository identifier or response could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Branch or file not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether the provider reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Status { status, .. } => *status == reqwest::StatusCode::NOT_FOUND,
            Error::Api(octocrab::Error::GitHub { source, .. }) => {
                source.message.contains("Not Found")
            }
            _ => false,
        }
    }
}

impl From<Error> for codeshift_core::Error {
    fn from(e: Error) -> Self {
        codeshift_core::Error::Hosting(e.to_string())
    }
}
