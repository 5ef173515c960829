//! Azure DevOps Repos provider

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use codeshift_core::changeset::{ChangeStatus, FileChange};
use codeshift_core::{HostingClient, RepositoryKind, ReviewRequest};

use crate::http::{check, optional};
use crate::repo_id::{parse_azure_repo, AzureRepo};
use crate::{Error, Result};

const PROVIDER: &str = "Azure DevOps";
const API_VERSION: &str = "7.1";
const ZERO_OBJECT_ID: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryInfo {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    path: String,
    #[serde(default)]
    is_folder: bool,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitRef {
    name: String,
    object_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    pull_request_id: u64,
}

/// Azure DevOps client
pub struct AzureHosting {
    http: reqwest::Client,
    token: String,
    org_url: Option<String>,
}

fn branch_ref(branch: &str) -> String {
    format!("refs/heads/{}", branch)
}

fn item_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

impl AzureHosting {
    /// `org_url` is used for identifiers without an organization segment
    pub fn new(token: &str, org_url: Option<&str>) -> Self {
        info!(organization = org_url.unwrap_or("per repository"), "Created Azure DevOps client");
        Self {
            http: reqwest::Client::new(),
            token: token.to_string(),
            org_url: org_url.map(str::to_string),
        }
    }

    fn repo(&self, repository: &str) -> Result<AzureRepo> {
        parse_azure_repo(repository, self.org_url.as_deref())
    }

    fn api_url(repo: &AzureRepo, resource: &str) -> String {
        let base = format!(
            "{}/{}/_apis/git/repositories/{}",
            repo.org_url, repo.project, repo.repo
        );
        if resource.is_empty() {
            base
        } else {
            format!("{}/{}", base, resource)
        }
    }

    fn web_url(repo: &AzureRepo, pull_request_id: u64) -> String {
        format!(
            "{}/{}/_git/{}/pullrequest/{}",
            repo.org_url, repo.project, repo.repo, pull_request_id
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth("", Some(&self.token))
            .query(&[("api-version", API_VERSION)])
    }

    async fn branch_sha(&self, repo: &AzureRepo, branch: &str) -> Result<String> {
        let response = self
            .request(reqwest::Method::GET, &Self::api_url(repo, "refs"))
            .query(&[("filter", format!("heads/{}", branch))])
            .send()
            .await?;
        let refs: ListResponse<GitRef> = check(PROVIDER, response).await?.json().await?;

        // The filter is a prefix match
        let wanted = branch_ref(branch);
        refs.value
            .into_iter()
            .find(|r| r.name == wanted)
            .map(|r| r.object_id)
            .ok_or_else(|| Error::NotFound(format!("branch {}", branch)))
    }

    async fn item(&self, repo: &AzureRepo, branch: &str, path: &str) -> Result<Item> {
        let response = self
            .request(reqwest::Method::GET, &Self::api_url(repo, "items"))
            .query(&[
                ("path", item_path(path).as_str()),
                ("includeContent", "true"),
                ("versionDescriptor.version", branch),
                ("versionDescriptor.versionType", "branch"),
                ("$format", "json"),
            ])
            .send()
            .await?;
        Ok(check(PROVIDER, response).await?.json().await?)
    }
}

/// Build the push that applies every change on top of `old_object_id`
fn push_payload(
    branch: &str,
    old_object_id: &str,
    message: &str,
    changes: &[(&FileChange, bool)],
) -> Value {
    let entries: Vec<Value> = changes
        .iter()
        .filter_map(|(change, exists)| match (change.status, exists, &change.content) {
            (ChangeStatus::Removed, true, _) => Some(json!({
                "changeType": "delete",
                "item": {"path": item_path(&change.path)}
            })),
            (ChangeStatus::Removed, false, _) | (_, _, None) => None,
            (_, exists, Some(content)) => Some(json!({
                "changeType": if *exists { "edit" } else { "add" },
                "item": {"path": item_path(&change.path)},
                "newContent": {"content": content, "contentType": "rawtext"}
            })),
        })
        .collect();

    json!({
        "refUpdates": [{"name": branch_ref(branch), "oldObjectId": old_object_id}],
        "commits": [{"comment": message, "changes": entries}]
    })
}

fn push_change_count(payload: &Value) -> usize {
    payload["commits"][0]["changes"]
        .as_array()
        .map(Vec::len)
        .unwrap_or(0)
}

#[async_trait]
impl HostingClient for AzureHosting {
    fn kind(&self) -> RepositoryKind {
        RepositoryKind::Azure
    }

    async fn default_branch(&self, repository: &str) -> codeshift_core::Result<String> {
        let repo = self.repo(repository)?;
        let response = self
            .request(reqwest::Method::GET, &Self::api_url(&repo, ""))
            .send()
            .await
            .map_err(Error::from)?;
        let info: RepositoryInfo = check(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(Error::from)?;
        info.default_branch
            .map(|b| b.trim_start_matches("refs/heads/").to_string())
            .ok_or_else(|| Error::NotFound(format!("default branch of {}", repository)).into())
    }

    async fn list_files(&self, repository: &str, branch: &str) -> codeshift_core::Result<Vec<String>> {
        let repo = self.repo(repository)?;
        let response = self
            .request(reqwest::Method::GET, &Self::api_url(&repo, "items"))
            .query(&[
                ("scopePath", "/"),
                ("recursionLevel", "Full"),
                ("versionDescriptor.version", branch),
                ("versionDescriptor.versionType", "branch"),
            ])
            .send()
            .await
            .map_err(Error::from)?;
        let items: ListResponse<Item> = check(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(Error::from)?;

        let files: Vec<String> = items
            .value
            .into_iter()
            .filter(|item| !item.is_folder)
            .map(|item| item.path.trim_start_matches('/').to_string())
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
        let repo = self.repo(repository)?;
        let item = optional(self.item(&repo, branch, path).await)?;
        Ok(item.filter(|i| !i.is_folder).and_then(|i| i.content))
    }

    async fn branch_exists(&self, repository: &str, branch: &str) -> codeshift_core::Result<bool> {
        let repo = self.repo(repository)?;
        Ok(optional(self.branch_sha(&repo, branch).await)?.is_some())
    }

    async fn create_branch(
        &self,
        repository: &str,
        branch: &str,
        from: &str,
    ) -> codeshift_core::Result<()> {
        let repo = self.repo(repository)?;
        let sha = self.branch_sha(&repo, from).await?;
        let response = self
            .request(reqwest::Method::POST, &Self::api_url(&repo, "refs"))
            .json(&json!([{
                "name": branch_ref(branch),
                "oldObjectId": ZERO_OBJECT_ID,
                "newObjectId": sha
            }]))
            .send()
            .await
            .map_err(Error::from)?;
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
        let repo = self.repo(repository)?;
        let head = self.branch_sha(&repo, branch).await?;

        let mut resolved = Vec::with_capacity(changes.len());
        for change in changes {
            let exists = optional(self.item(&repo, branch, &change.path).await)?.is_some();
            resolved.push((change, exists));
        }

        let payload = push_payload(branch, &head, message, &resolved);
        let changed = push_change_count(&payload);
        if changed == 0 {
            warn!(repository, branch, "No applicable changes to commit");
            return Ok(0);
        }

        let response = self
            .request(reqwest::Method::POST, &Self::api_url(&repo, "pushes"))
            .json(&payload)
            .send()
            .await
            .map_err(Error::from)?;
        check(PROVIDER, response).await?;

        info!(repository, branch, changed, "Committed changes");
        Ok(changed)
    }

    async fn open_review(
        &self,
        repository: &str,
        review: &ReviewRequest,
    ) -> codeshift_core::Result<String> {
        let repo = self.repo(repository)?;
        let response = self
            .request(reqwest::Method::POST, &Self::api_url(&repo, "pullrequests"))
            .json(&json!({
                "sourceRefName": branch_ref(&review.source_branch),
                "targetRefName": branch_ref(&review.target_branch),
                "title": review.title,
                "description": review.body,
            }))
            .send()
            .await
            .map_err(Error::from)?;
        let pr: PullRequest = check(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(Error::from)?;

        let url = Self::web_url(&repo, pr.pull_request_id);
        info!(repository, url = %url, "Opened pull request");
        Ok(url)
    }
}

impl std::fmt::Debug for AzureHosting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureHosting")
            .field("org_url", &self.org_url)
            .finish_non_exhaustive()
    }
}
