//! Building the hosting registry from configuration

use std::sync::Arc;
use tracing::{debug, warn};

use codeshift_core::config::HostingConfig;
use codeshift_core::{HostingRegistry, RepositoryKind, Secrets};

use crate::{AzureHosting, GithubHosting, GitlabHosting, Result};

/// Provider tokens, resolved from the environment and secrets file
#[derive(Clone, Default)]
pub struct HostingTokens {
    pub github: Option<String>,
    pub gitlab: Option<String>,
    pub azure: Option<String>,
}

impl HostingTokens {
    pub fn from_secrets(secrets: &Secrets) -> Self {
        Self {
            github: secrets.github_token(),
            gitlab: secrets.gitlab_token(),
            azure: secrets.azure_token(),
        }
    }
}

impl std::fmt::Debug for HostingTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostingTokens")
            .field("github", &self.github.is_some())
            .field("gitlab", &self.gitlab.is_some())
            .field("azure", &self.azure.is_some())
            .finish()
    }
}

/// Register a client for every provider that has a token
///
/// Providers without a token are left out; jobs targeting them fail with a
/// configuration error when they start.
pub fn build_registry(config: &HostingConfig, tokens: &HostingTokens) -> Result<HostingRegistry> {
    let mut registry = HostingRegistry::new();

    match tokens.github.as_deref() {
        Some(token) => registry.register(Arc::new(GithubHosting::new(
            token,
            config.github_api_url.as_deref(),
        )?)),
        None => skip(RepositoryKind::Github, "GITHUB_TOKEN"),
    }

    match tokens.gitlab.as_deref() {
        Some(token) => registry.register(Arc::new(GitlabHosting::new(token, &config.gitlab_url))),
        None => skip(RepositoryKind::Gitlab, "GITLAB_TOKEN"),
    }

    match tokens.azure.as_deref() {
        Some(token) => registry.register(Arc::new(AzureHosting::new(
            token,
            config.azure_org_url.as_deref(),
        ))),
        None => skip(RepositoryKind::Azure, "AZURE_DEVOPS_TOKEN"),
    }

    debug!(providers = ?registry.list_registered(), "Hosting registry ready");
    Ok(registry)
}

fn skip(kind: RepositoryKind, env_var: &str) {
    warn!(provider = %kind, "No token configured ({} or secrets file); provider disabled", env_var);
}
