//! Repository identifiers per provider

use crate::{Error, Result};

/// Parse a GitHub repository into owner and repo
///
/// Supports formats:
/// - owner/repo
/// - https://github.com/owner/repo
/// - git@github.com:owner/repo.git
pub fn parse_github_repo(repository: &str) -> Result<(String, String)> {
    let repository = repository.trim();

    if !repository.contains("://") && !repository.contains('@') {
        let parts: Vec<&str> = repository.split('/').collect();
        if let [owner, repo] = parts.as_slice() {
            if !owner.is_empty() && !repo.is_empty() {
                return Ok((owner.to_string(), repo.trim_end_matches(".git").to_string()));
            }
        }
        return Err(Error::Parse(format!(
            "Invalid repository format: {}. Expected owner/repo",
            repository
        )));
    }

    if repository.starts_with("https://") || repository.starts_with("http://") {
        let url = url::Url::parse(repository).map_err(|e| Error::Parse(e.to_string()))?;
        let path = url.path().trim_start_matches('/').trim_end_matches(".git");
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() >= 2 {
            return Ok((parts[0].to_string(), parts[1].to_string()));
        }
        return Err(Error::Parse(format!("Invalid GitHub URL path: {}", path)));
    }

    if repository.starts_with("git@") {
        if let Some(path) = repository.split(':').nth(1) {
            let path = path.trim_end_matches(".git");
            let parts: Vec<&str> = path.split('/').collect();
            if parts.len() >= 2 {
                return Ok((parts[0].to_string(), parts[1].to_string()));
            }
        }
        return Err(Error::Parse(format!("Invalid SSH URL: {}", repository)));
    }

    Err(Error::Parse(format!("Unrecognized URL format: {}", repository)))
}

/// Parse a GitLab project path (`group/subgroup/project` or a numeric id)
pub fn parse_gitlab_project(repository: &str) -> Result<String> {
    let path = repository.trim();
    let path = match url::Url::parse(path) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => path.to_string(),
    };
    let path = path.trim_matches('/').trim_end_matches(".git");

    if path.is_empty() || path.split('/').any(str::is_empty) {
        return Err(Error::Parse(format!(
            "Invalid GitLab project: {}. Expected group/project",
            repository
        )));
    }
    Ok(path.to_string())
}

/// An Azure DevOps repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureRepo {
    /// Organization URL, e.g. `https://dev.azure.com/acme`
    pub org_url: String,
    pub project: String,
    pub repo: String,
}

/// Parse `organization/project/repo`, or `project/repo` with a configured organization
pub fn parse_azure_repo(repository: &str, org_url: Option<&str>) -> Result<AzureRepo> {
    let parts: Vec<&str> = repository.trim().trim_matches('/').split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(Error::Parse(format!("Invalid Azure repository: {}", repository)));
    }

    match parts.as_slice() {
        [org, project, repo] => Ok(AzureRepo {
            org_url: format!("https://dev.azure.com/{}", org),
            project: project.to_string(),
            repo: repo.to_string(),
        }),
        [project, repo] => {
            let org_url = org_url.filter(|u| !u.is_empty()).ok_or_else(|| {
                Error::Parse(format!(
                    "Azure repository {} needs an organization; use org/project/repo \
                     or set hosting.azure_org_url",
                    repository
                ))
            })?;
            Ok(AzureRepo {
                org_url: org_url.trim_end_matches('/').to_string(),
                project: project.to_string(),
                repo: repo.to_string(),
            })
        }
        _ => Err(Error::Parse(format!(
            "Invalid Azure repository: {}. Expected organization/project/repo",
            repository
        ))),
    }
}
