//! Git hosting abstraction
//!
//! Each provider (GitHub, GitLab, Azure DevOps) implements [`HostingClient`].
//! Repository reading and the stacked-PR commit chain are written once on top
//! of that trait.

mod reader;

pub use reader::{ExtensionTable, HostedRepositoryReader, RepositoryReader};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::changeset::FileChange;
use crate::{Error, Result};

/// Which hosting provider a repository lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    #[default]
    Github,
    Gitlab,
    Azure,
}

impl RepositoryKind {
    /// Get all supported kinds
    pub fn all() -> &'static [RepositoryKind] {
        &[
            RepositoryKind::Github,
            RepositoryKind::Gitlab,
            RepositoryKind::Azure,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            RepositoryKind::Github => "github",
            RepositoryKind::Gitlab => "gitlab",
            RepositoryKind::Azure => "azure",
        }
    }

    /// What the provider calls a pull request
    pub fn review_noun(&self) -> &'static str {
        match self {
            RepositoryKind::Gitlab => "merge request",
            RepositoryKind::Github | RepositoryKind::Azure => "pull request",
        }
    }
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for RepositoryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" | "gh" => Ok(RepositoryKind::Github),
            "gitlab" | "gl" => Ok(RepositoryKind::Gitlab),
            "azure" | "azure_devops" | "azuredevops" | "ado" => Ok(RepositoryKind::Azure),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

/// A repository on a specific provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub kind: RepositoryKind,
    /// Provider-specific identifier (`owner/repo`, `group/project`, `org/project/repo`)
    pub name: String,
}

impl RepositoryRef {
    pub fn new(kind: RepositoryKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// A pull/merge request to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub body: String,
}

/// Provider-specific repository operations
#[async_trait]
pub trait HostingClient: Send + Sync {
    /// Provider this client talks to
    fn kind(&self) -> RepositoryKind;

    /// Default branch of a repository
    async fn default_branch(&self, repository: &str) -> Result<String>;

    /// All file paths on a branch
    async fn list_files(&self, repository: &str, branch: &str) -> Result<Vec<String>>;

    /// Content of a file, `None` if it does not exist
    async fn read_file(&self, repository: &str, branch: &str, path: &str)
        -> Result<Option<String>>;

    /// Whether a branch exists
    async fn branch_exists(&self, repository: &str, branch: &str) -> Result<bool>;

    /// Create `branch` pointing at the head of `from`
    async fn create_branch(&self, repository: &str, branch: &str, from: &str) -> Result<()>;

    /// Apply changes to a branch, returning how many files were touched
    async fn commit_changes(
        &self,
        repository: &str,
        branch: &str,
        message: &str,
        changes: &[FileChange],
    ) -> Result<usize>;

    /// Open a pull/merge request, returning its web URL
    async fn open_review(&self, repository: &str, review: &ReviewRequest) -> Result<String>;
}

/// Registry of hosting clients by provider
#[derive(Clone, Default)]
pub struct HostingRegistry {
    clients: HashMap<RepositoryKind, Arc<dyn HostingClient>>,
}

impl HostingRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under its own kind
    pub fn register(&mut self, client: Arc<dyn HostingClient>) {
        self.clients.insert(client.kind(), client);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, client: Arc<dyn HostingClient>) -> Self {
        self.register(client);
        self
    }

    /// Get the client for a provider
    pub fn get(&self, kind: RepositoryKind) -> Result<Arc<dyn HostingClient>> {
        self.clients.get(&kind).cloned().ok_or_else(|| {
            Error::Config(format!(
                "No {} client configured (missing credentials?)",
                kind
            ))
        })
    }

    /// List registered providers
    pub fn list_registered(&self) -> Vec<RepositoryKind> {
        let mut kinds: Vec<_> = self.clients.keys().copied().collect();
        kinds.sort_by_key(|k| k.name());
        kinds
    }
}

impl fmt::Debug for HostingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostingRegistry")
            .field("clients", &self.list_registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeHosting;

    #[test]
    fn test_repository_kind_from_str() {
        assert_eq!("github".parse::<RepositoryKind>().unwrap(), RepositoryKind::Github);
        assert_eq!("GitLab".parse::<RepositoryKind>().unwrap(), RepositoryKind::Gitlab);
        assert_eq!("azure_devops".parse::<RepositoryKind>().unwrap(), RepositoryKind::Azure);
        assert!("bitbucket".parse::<RepositoryKind>().is_err());
    }

    #[test]
    fn test_repository_kind_serde() {
        let json = serde_json::to_string(&RepositoryKind::Azure).unwrap();
        assert_eq!(json, "\"azure\"");
    }

    #[test]
    fn test_review_noun() {
        assert_eq!(RepositoryKind::Gitlab.review_noun(), "merge request");
        assert_eq!(RepositoryKind::Github.review_noun(), "pull request");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = HostingRegistry::new().with(Arc::new(FakeHosting::new(RepositoryKind::Gitlab)));

        assert!(registry.get(RepositoryKind::Gitlab).is_ok());
        let missing = registry.get(RepositoryKind::Github);
        assert!(matches!(missing, Err(Error::Config(_))));
        assert_eq!(registry.list_registered(), vec![RepositoryKind::Gitlab]);
    }
}
