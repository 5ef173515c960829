//! GitHub provider using octocrab

use async_trait::async_trait;
use base64::Engine;
use octocrab::params::repos::Reference;
use octocrab::Octocrab;
use serde::Deserialize;
use tracing::{debug, info, warn};

use codeshift_core::changeset::{ChangeStatus, FileChange};
use codeshift_core::{HostingClient, RepositoryKind, ReviewRequest};

use crate::http::optional;
use crate::repo_id::parse_github_repo;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// A file as stored on a branch
struct RemoteFile {
    sha: String,
    text: Option<String>,
}

/// GitHub client for repository operations
pub struct GithubHosting {
    client: Octocrab,
}

impl GithubHosting {
    /// Create a client authenticated with a personal access token
    ///
    /// `api_url` points at a GitHub Enterprise API; api.github.com when `None`.
    pub fn new(token: &str, api_url: Option<&str>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());
        if let Some(url) = api_url {
            builder = builder.base_uri(url)?;
        }
        let client = builder
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(enterprise = api_url.is_some(), "Created GitHub client");
        Ok(Self { client })
    }

    async fn branch_sha(&self, owner: &str, repo: &str, branch: &str) -> Result<String> {
        let reference = self
            .client
            .repos(owner, repo)
            .get_ref(&Reference::Branch(branch.to_string()))
            .await?;

        match reference.object {
            octocrab::models::repos::Object::Commit { sha, .. } => Ok(sha),
            octocrab::models::repos::Object::Tag { sha, .. } => Ok(sha),
            _ => Err(Error::Parse(format!(
                "Branch {} does not point at a commit",
                branch
            ))),
        }
    }

    async fn remote_file(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<Option<RemoteFile>> {
        let fetched = self
            .client
            .repos(owner, repo)
            .get_content()
            .path(path)
            .r#ref(branch)
            .send()
            .await
            .map_err(Error::from);

        let Some(mut items) = optional(fetched)? else {
            return Ok(None);
        };
        // A directory lists several entries; only a single file counts
        if items.items.len() != 1 {
            return Ok(None);
        }
        let item = items.items.remove(0);
        let text = item.content.as_deref().map(decode_content).transpose()?;
        Ok(Some(RemoteFile {
            sha: item.sha,
            text,
        }))
    }
}

/// Decode the base64 content GitHub returns, which is wrapped at 60 columns
fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| Error::Parse(format!("Invalid base64 content: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::Parse(format!("File is not UTF-8: {}", e)))
}

#[async_trait]
impl HostingClient for GithubHosting {
    fn kind(&self) -> RepositoryKind {
        RepositoryKind::Github
    }

    async fn default_branch(&self, repository: &str) -> codeshift_core::Result<String> {
        let (owner, repo) = parse_github_repo(repository)?;
        let info = self
            .client
            .repos(&owner, &repo)
            .get()
            .await
            .map_err(Error::from)?;
        info.default_branch
            .ok_or_else(|| Error::NotFound(format!("default branch of {}", repository)).into())
    }

    async fn list_files(&self, repository: &str, branch: &str) -> codeshift_core::Result<Vec<String>> {
        let (owner, repo) = parse_github_repo(repository)?;
        let route = format!("/repos/{}/{}/git/trees/{}?recursive=1", owner, repo, branch);
        let tree: TreeResponse = self
            .client
            .get(route, None::<&()>)
            .await
            .map_err(Error::from)?;

        if tree.truncated {
            warn!(repository, branch, "GitHub truncated the file tree");
        }

        let files: Vec<String> = tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .collect();
        debug!(repository, branch, files = files.len(), "Listed files");
        Ok(files)
    }

    async fn read_file(
        &self,
        repository: &str,
        branch: &str,
        path: &str,
    ) -> codeshift_core::Result<Option<String>> {
        let (owner, repo) = parse_github_repo(repository)?;
        let file = self.remote_file(&owner, &repo, branch, path).await?;
        Ok(file.and_then(|f| f.text))
    }

    async fn branch_exists(&self, repository: &str, branch: &str) -> codeshift_core::Result<bool> {
        let (owner, repo) = parse_github_repo(repository)?;
        let sha = optional(self.branch_sha(&owner, &repo, branch).await)?;
        Ok(sha.is_some())
    }

    async fn create_branch(
        &self,
        repository: &str,
        branch: &str,
        from: &str,
    ) -> codeshift_core::Result<()> {
        let (owner, repo) = parse_github_repo(repository)?;
        let sha = self.branch_sha(&owner, &repo, from).await?;
        self.client
            .repos(&owner, &repo)
            .create_ref(&Reference::Branch(branch.to_string()), sha)
            .await
            .map_err(Error::from)?;
        info!(repository, branch, from, "Created branch");
        Ok(())
    }

    async fn commit_changes(
        &self,
        repository: &str,
        branch: &str,
        message: &str,
        changes: &[FileChange],
    ) -> codeshift_core::Result<usize> {
        let (owner, repo) = parse_github_repo(repository)?;
        let repos = self.client.repos(&owner, &repo);
        let mut changed = 0;

        // The contents API writes one commit per file
        for change in changes {
            let existing = self.remote_file(&owner, &repo, branch, &change.path).await?;

            match (change.status, change.content.as_deref(), existing) {
                (ChangeStatus::Removed, _, Some(file)) => {
                    repos
                        .delete_file(&change.path, message, &file.sha)
                        .branch(branch)
                        .send()
                        .await
                        .map_err(Error::from)?;
                }
                (ChangeStatus::Removed, _, None) => {
                    debug!(path = %change.path, "File already absent");
                    continue;
                }
                (_, Some(content), Some(file)) => {
                    if file.text.as_deref() == Some(content) {
                        debug!(path = %change.path, "Content unchanged");
                        continue;
                    }
                    repos
                        .update_file(&change.path, message, content, &file.sha)
                        .branch(branch)
                        .send()
                        .await
                        .map_err(Error::from)?;
                }
                (_, Some(content), None) => {
                    repos
                        .create_file(&change.path, message, content)
                        .branch(branch)
                        .send()
                        .await
                        .map_err(Error::from)?;
                }
                (_, None, _) => {
                    warn!(path = %change.path, "Skipping change without content");
                    continue;
                }
            }
            changed += 1;
        }

        info!(repository, branch, changed, "Committed changes");
        Ok(changed)
    }

    async fn open_review(
        &self,
        repository: &str,
        review: &ReviewRequest,
    ) -> codeshift_core::Result<String> {
        let (owner, repo) = parse_github_repo(repository)?;
        let pr = self
            .client
            .pulls(&owner, &repo)
            .create(&review.title, &review.source_branch, &review.target_branch)
            .body(&review.body)
            .send()
            .await
            .map_err(Error::from)?;

        let url = pr
            .html_url
            .map(|u| u.to_string())
            .unwrap_or_else(|| format!("https://github.com/{}/{}/pull/{}", owner, repo, pr.number));
        info!(repository, url = %url, "Opened pull request");
        Ok(url)
    }
}

impl std::fmt::Debug for GithubHosting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubHosting").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wrapped_content() {
        let encoded = "cHJpbnQo\nJ2hpJyk=\n";
        assert_eq!(decode_content(encoded).unwrap(), "print('hi')");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_content("!!!").is_err());
    }

    #[test]
    fn test_tree_only_lists_blobs() {
        let tree: TreeResponse = serde_json::from_str(
            r#"{"sha": "abc", "truncated": false, "tree": [
                {"path": "src", "type": "tree"},
                {"path": "src/app.py", "type": "blob"}
            ]}"#,
        )
        .unwrap();
        let blobs: Vec<_> = tree
            .tree
            .into_iter()
            .filter(|e| e.kind == "blob")
            .map(|e| e.path)
            .collect();
        assert_eq!(blobs, vec!["src/app.py"]);
    }
}
