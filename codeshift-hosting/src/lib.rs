//! Hosting providers for codeshift
//!
//! Implements the core `HostingClient` trait for GitHub (octocrab), GitLab
//! and Azure DevOps (REST over reqwest).

mod azure;
mod error;
mod github;
mod gitlab;
mod http;
mod registry;
pub mod repo_id;

pub use azure::AzureHosting;
pub use error::{Error, Result};
pub use github::GithubHosting;
pub use gitlab::GitlabHosting;
pub use registry::{build_registry, HostingTokens};
