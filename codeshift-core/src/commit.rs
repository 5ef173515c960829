//! Commit dispatch: one branch and one pull request per changeset group
//!
//! Branches form a stacked chain. The first branch is cut from the base
//! branch; each following branch is cut from the last branch that
//! succeeded, and its pull request targets that same branch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::changeset::BranchChangeset;
use crate::hosting::{HostingClient, HostingRegistry, RepositoryRef, ReviewRequest};
use crate::Result;

/// Result of committing one branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub branch_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    pub message: String,
    pub files_changed: usize,
}

impl CommitOutcome {
    fn failed(branch_name: &str, message: impl Into<String>) -> Self {
        Self {
            branch_name: branch_name.to_string(),
            success: false,
            pr_url: None,
            message: message.into(),
            files_changed: 0,
        }
    }
}

/// Applies branch changesets to a repository
#[async_trait]
pub trait CommitProcessor: Send + Sync {
    /// Commit every branch in order, returning one outcome per branch
    ///
    /// Per-branch failures are reported in the outcome; an `Err` means the
    /// whole dispatch could not start.
    async fn apply(
        &self,
        repository: &RepositoryRef,
        base_branch: &str,
        branches: &[BranchChangeset],
    ) -> Result<Vec<CommitOutcome>>;
}

/// [`CommitProcessor`] that chains branches through the provider's hosting client
pub struct ChainedCommitter {
    registry: HostingRegistry,
}

impl ChainedCommitter {
    pub fn new(registry: HostingRegistry) -> Self {
        Self { registry }
    }

    async fn apply_branch(
        &self,
        client: &Arc<dyn HostingClient>,
        repository: &RepositoryRef,
        source_branch: &str,
        plan: &BranchChangeset,
    ) -> Result<CommitOutcome> {
        if plan.changes.is_empty() {
            return Ok(CommitOutcome {
                branch_name: plan.branch_name.clone(),
                success: true,
                pr_url: None,
                message: "No changes to apply".to_string(),
                files_changed: 0,
            });
        }

        if !client.branch_exists(&repository.name, &plan.branch_name).await? {
            client
                .create_branch(&repository.name, &plan.branch_name, source_branch)
                .await?;
            debug!(branch = %plan.branch_name, from = %source_branch, "Created branch");
        }

        let files_changed = client
            .commit_changes(&repository.name, &plan.branch_name, &plan.pr_title, &plan.changes)
            .await?;

        if files_changed == 0 {
            return Ok(CommitOutcome {
                branch_name: plan.branch_name.clone(),
                success: true,
                pr_url: None,
                message: "Branch already up to date, no changes applied".to_string(),
                files_changed: 0,
            });
        }

        let review = ReviewRequest {
            source_branch: plan.branch_name.clone(),
            target_branch: source_branch.to_string(),
            title: plan.pr_title.clone(),
            body: plan.pr_body.clone(),
        };
        let url = client.open_review(&repository.name, &review).await?;

        Ok(CommitOutcome {
            branch_name: plan.branch_name.clone(),
            success: true,
            pr_url: Some(url),
            message: format!(
                "Committed {} file(s) and opened {}",
                files_changed,
                repository.kind.review_noun()
            ),
            files_changed,
        })
    }
}

#[async_trait]
impl CommitProcessor for ChainedCommitter {
    async fn apply(
        &self,
        repository: &RepositoryRef,
        base_branch: &str,
        branches: &[BranchChangeset],
    ) -> Result<Vec<CommitOutcome>> {
        let client = self.registry.get(repository.kind)?;
        let mut source = base_branch.to_string();
        let mut outcomes = Vec::with_capacity(branches.len());

        info!(
            repository = %repository,
            base = %base_branch,
            branches = branches.len(),
            "Committing changesets"
        );

        for plan in branches {
            match self.apply_branch(&client, repository, &source, plan).await {
                Ok(outcome) => {
                    info!(
                        branch = %outcome.branch_name,
                        files = outcome.files_changed,
                        pr_url = outcome.pr_url.as_deref().unwrap_or(""),
                        "Branch committed"
                    );
                    // Only branches with an open review become the next base
                    if outcome.pr_url.is_some() {
                        source = plan.branch_name.clone();
                    }
                    outcomes.push(outcome);
                }
                Err(e) => {
                    error!(branch = %plan.branch_name, error = %e, "Branch commit failed");
                    outcomes.push(CommitOutcome::failed(&plan.branch_name, e.to_string()));
                }
            }
        }

        let failed = outcomes.iter().filter(|o| !o.success).count();
        if failed > 0 {
            warn!(repository = %repository, failed, "Some branches failed to commit");
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::{ChangeStatus, FileChange};
    use crate::hosting::RepositoryKind;
    use crate::test_support::FakeHosting;

    fn plan(name: &str, changes: Vec<FileChange>) -> BranchChangeset {
        BranchChangeset {
            branch_name: name.to_string(),
            pr_title: format!("PR {}", name),
            pr_body: String::new(),
            changes,
        }
    }

    fn setup(kind: RepositoryKind) -> (Arc<FakeHosting>, ChainedCommitter, RepositoryRef) {
        let hosting = Arc::new(FakeHosting::new(kind));
        hosting.put_file("main", "a.py", "old");
        let committer = ChainedCommitter::new(HostingRegistry::new().with(hosting.clone()));
        (hosting, committer, RepositoryRef::new(kind, "acme/api"))
    }

    #[tokio::test]
    async fn test_branches_are_stacked() {
        let (hosting, committer, repo) = setup(RepositoryKind::Github);
        let branches = vec![
            plan("feat/one", vec![FileChange::write("a.py", ChangeStatus::Modified, "new")]),
            plan("feat/two", vec![FileChange::write("b.py", ChangeStatus::Added, "b")]),
        ];

        let outcomes = committer.apply(&repo, "main", &branches).await.unwrap();

        assert!(outcomes.iter().all(|o| o.success));
        assert_eq!(outcomes[0].files_changed, 1);
        assert!(outcomes[0].pr_url.is_some());

        let reviews = hosting.reviews();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].target_branch, "main");
        assert_eq!(reviews[1].source_branch, "feat/two");
        assert_eq!(reviews[1].target_branch, "feat/one");

        // feat/two was cut from feat/one and carries its change
        assert_eq!(hosting.file("feat/two", "a.py").as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_empty_branch_is_success_without_review() {
        let (hosting, committer, repo) = setup(RepositoryKind::Gitlab);
        let branches = vec![
            plan("feat/empty", vec![]),
            plan("feat/real", vec![FileChange::remove("a.py")]),
        ];

        let outcomes = committer.apply(&repo, "main", &branches).await.unwrap();

        assert!(outcomes[0].success);
        assert!(outcomes[0].pr_url.is_none());
        assert!(outcomes[1].message.contains("merge request"));
        assert_eq!(hosting.reviews()[0].target_branch, "main");
        assert_eq!(hosting.file("feat/real", "a.py"), None);
    }

    #[tokio::test]
    async fn test_failed_branch_does_not_advance_chain() {
        let (hosting, committer, repo) = setup(RepositoryKind::Github);
        hosting.fail_branch("feat/broken");
        let branches = vec![
            plan("feat/broken", vec![FileChange::write("x.py", ChangeStatus::Added, "x")]),
            plan("feat/next", vec![FileChange::write("y.py", ChangeStatus::Added, "y")]),
        ];

        let outcomes = committer.apply(&repo, "main", &branches).await.unwrap();

        assert!(!outcomes[0].success);
        assert!(outcomes[1].success);
        assert_eq!(hosting.reviews()[0].target_branch, "main");
    }

    #[tokio::test]
    async fn test_missing_client_is_error() {
        let committer = ChainedCommitter::new(HostingRegistry::new());
        let repo = RepositoryRef::new(RepositoryKind::Azure, "org/proj/repo");
        assert!(committer.apply(&repo, "main", &[]).await.is_err());
    }
}
