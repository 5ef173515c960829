//! GitLab provider over the REST API v4

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use codeshift_core::changeset::{ChangeStatus, FileChange};
use codeshift_core::{HostingClient, RepositoryKind, ReviewRequest};

use crate::http::{check, encode_segment, optional};
use crate::repo_id::parse_gitlab_project;
use crate::Result;

const PROVIDER: &str = "GitLab";
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Project {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    web_url: String,
}

#[derive(Debug, Serialize)]
struct CommitAction<'a> {
    action: &'static str,
    file_path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CommitPayload<'a> {
    branch: &'a str,
    commit_message: &'a str,
    actions: Vec<CommitAction<'a>>,
}

/// GitLab client
pub struct GitlabHosting {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitlabHosting {
    /// `base_url` is the instance root, e.g. `https://gitlab.com`
    pub fn new(token: &str, base_url: &str) -> Self {
        let api_url = format!("{}/api/v4", base_url.trim_end_matches('/'));
        info!(api_url = %api_url, "Created GitLab client");
        Self {
            http: reqwest::Client::new(),
            api_url,
            token: token.to_string(),
        }
    }

    fn project_url(&self, repository: &str) -> Result<String> {
        let project = parse_gitlab_project(repository)?;
        Ok(format!("{}/projects/{}", self.api_url, encode_segment(&project)))
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.get(url).header("PRIVATE-TOKEN", &self.token)
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.post(url).header("PRIVATE-TOKEN", &self.token)
    }

    async fn raw_file(&self, repository: &str, branch: &str, path: &str) -> Result<String> {
        let url = format!(
            "{}/repository/files/{}/raw",
            self.project_url(repository)?,
            encode_segment(path)
        );
        let response = self.get(&url).query(&[("ref", branch)]).send().await?;
        Ok(check(PROVIDER, response).await?.text().await?)
    }
}

/// Build the single commit that applies every change
fn commit_payload<'a>(
    branch: &'a str,
    message: &'a str,
    changes: &'a [(&'a FileChange, bool)],
) -> CommitPayload<'a> {
    let actions = changes
        .iter()
        .filter_map(|(change, exists)| {
            let action = match (change.status, exists) {
                (ChangeStatus::Removed, true) => "delete",
                (ChangeStatus::Removed, false) => return None,
                (_, true) => "update",
                (_, false) => "create",
            };
            if action != "delete" && change.content.is_none() {
                return None;
            }
            Some(CommitAction {
                action,
                file_path: &change.path,
                content: if action == "delete" {
                    None
                } else {
                    change.content.as_deref()
                },
            })
        })
        .collect();

    CommitPayload {
        branch,
        commit_message: message,
        actions,
    }
}

#[async_trait]
impl HostingClient for GitlabHosting {
    fn kind(&self) -> RepositoryKind {
        RepositoryKind::Gitlab
    }

    async fn default_branch(&self, repository: &str) -> codeshift_core::Result<String> {
        let response = self.get(&self.project_url(repository)?).send().await.map_err(crate::Error::from)?;
        let project: Project = check(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(crate::Error::from)?;
        project.default_branch.ok_or_else(|| {
            crate::Error::NotFound(format!("default branch of {}", repository)).into()
        })
    }

    async fn list_files(&self, repository: &str, branch: &str) -> codeshift_core::Result<Vec<String>> {
        let url = format!("{}/repository/tree", self.project_url(repository)?);
        let mut files = Vec::new();
        let mut page = 1;

        loop {
            let response = self
                .get(&url)
                .query(&[
                    ("ref", branch.to_string()),
                    ("recursive", "true".to_string()),
                    ("per_page", PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await
                .map_err(crate::Error::from)?;
            let items: Vec<TreeItem> = check(PROVIDER, response)
                .await?
                .json()
                .await
                .map_err(crate::Error::from)?;

            let count = items.len();
            files.extend(
                items
                    .into_iter()
                    .filter(|item| item.kind == "blob")
                    .map(|item| item.path),
            );
            if count < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        debug!(repository, branch, files = files.len(), "Listed files");
        Ok(files)
    }

    async fn read_file(
        &self,
        repository: &str,
        branch: &str,
        path: &str,
    ) -> codeshift_core::Result<Option<String>> {
        Ok(optional(self.raw_file(repository, branch, path).await)?)
    }

    async fn branch_exists(&self, repository: &str, branch: &str) -> codeshift_core::Result<bool> {
        let url = format!(
            "{}/repository/branches/{}",
            self.project_url(repository)?,
            encode_segment(branch)
        );
        let response = self.get(&url).send().await.map_err(crate::Error::from)?;
        Ok(optional(check(PROVIDER, response).await)?.is_some())
    }

    async fn create_branch(
        &self,
        repository: &str,
        branch: &str,
        from: &str,
    ) -> codeshift_core::Result<()> {
        let url = format!("{}/repository/branches", self.project_url(repository)?);
        let response = self
            .post(&url)
            .query(&[("branch", branch), ("ref", from)])
            .send()
            .await
            .map_err(crate::Error::from)?;
        check(PROVIDER, response).await?;
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
        // Actions must say whether each file exists on the branch
        let mut resolved = Vec::with_capacity(changes.len());
        for change in changes {
            let exists = self.read_file(repository, branch, &change.path).await?.is_some();
            resolved.push((change, exists));
        }

        let payload = commit_payload(branch, message, &resolved);
        if payload.actions.is_empty() {
            warn!(repository, branch, "No applicable changes to commit");
            return Ok(0);
        }

        let url = format!("{}/repository/commits", self.project_url(repository)?);
        let response = self
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(crate::Error::from)?;
        check(PROVIDER, response).await?;

        let changed = payload.actions.len();
        info!(repository, branch, changed, "Committed changes");
        Ok(changed)
    }

    async fn open_review(
        &self,
        repository: &str,
        review: &ReviewRequest,
    ) -> codeshift_core::Result<String> {
        let url = format!("{}/merge_requests", self.project_url(repository)?);
        let response = self
            .post(&url)
            .json(&serde_json::json!({
                "source_branch": review.source_branch,
                "target_branch": review.target_branch,
                "title": review.title,
                "description": review.body,
            }))
            .send()
            .await
            .map_err(crate::Error::from)?;
        let mr: MergeRequest = check(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(crate::Error::from)?;
        info!(repository, url = %mr.web_url, "Opened merge request");
        Ok(mr.web_url)
    }
}

impl std::fmt::Debug for GitlabHosting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitlabHosting")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_url_encodes_path() {
        let client = GitlabHosting::new("t", "https://gitlab.example.com/");
        assert_eq!(
            client.project_url("group/sub/api").unwrap(),
            "https://gitlab.example.com/api/v4/projects/group%2Fsub%2Fapi"
        );
    }

    #[test]
    fn test_commit_payload_actions() {
        let modified = FileChange::write("a.py", ChangeStatus::Modified, "A");
        let added = FileChange::write("b.py", ChangeStatus::Added, "B");
        let removed = FileChange::remove("c.py");
        let gone = FileChange::remove("d.py");
        let changes = vec![
            (&modified, true),
            (&added, false),
            (&removed, true),
            (&gone, false),
        ];

        let payload = commit_payload("feat/x", "Refactor", &changes);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "branch": "feat/x",
                "commit_message": "Refactor",
                "actions": [
                    {"action": "update", "file_path": "a.py", "content": "A"},
                    {"action": "create", "file_path": "b.py", "content": "B"},
                    {"action": "delete", "file_path": "c.py"}
                ]
            })
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let client = GitlabHosting::new("secret-token", "https://gitlab.com");
        assert!(!format!("{:?}", client).contains("secret-token"));
    }
}
