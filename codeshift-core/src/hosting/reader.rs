//! Reading repository files for analysis

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::HostingClient;
use crate::{Error, Result};

/// Analysis type → file extensions to read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionTable(HashMap<String, Vec<String>>);

impl ExtensionTable {
    pub fn new(entries: HashMap<String, Vec<String>>) -> Self {
        Self(entries)
    }

    /// Extensions for an analysis type, normalized to a leading dot and lowercase
    pub fn extensions_for(&self, analysis_type: &str) -> Option<Vec<String>> {
        self.0.get(analysis_type).map(|exts| {
            exts.iter()
                .map(|e| {
                    let e = e.trim().to_lowercase();
                    if e.starts_with('.') {
                        e
                    } else {
                        format!(".{}", e)
                    }
                })
                .collect()
        })
    }

    pub fn contains(&self, analysis_type: &str) -> bool {
        self.0.contains_key(analysis_type)
    }
}

/// Reads source files from a repository
#[async_trait]
pub trait RepositoryReader: Send + Sync {
    /// Read files for an analysis
    ///
    /// With `files`, exactly those paths are read; otherwise every file on
    /// the branch whose extension belongs to `analysis_type` is read.
    async fn read(
        &self,
        repository: &str,
        analysis_type: &str,
        branch: Option<&str>,
        files: Option<&[String]>,
    ) -> Result<BTreeMap<String, String>>;
}

/// [`RepositoryReader`] backed by a provider's [`HostingClient`]
pub struct HostedRepositoryReader {
    client: Arc<dyn HostingClient>,
    extensions: Arc<ExtensionTable>,
}

impl HostedRepositoryReader {
    pub fn new(client: Arc<dyn HostingClient>, extensions: Arc<ExtensionTable>) -> Self {
        Self { client, extensions }
    }
}

#[async_trait]
impl RepositoryReader for HostedRepositoryReader {
    async fn read(
        &self,
        repository: &str,
        analysis_type: &str,
        branch: Option<&str>,
        files: Option<&[String]>,
    ) -> Result<BTreeMap<String, String>> {
        let branch = match branch {
            Some(b) if !b.is_empty() => b.to_string(),
            _ => self.client.default_branch(repository).await?,
        };

        let paths: Vec<String> = match files {
            Some(files) if !files.is_empty() => files.to_vec(),
            _ => {
                let extensions = self.extensions.extensions_for(analysis_type).ok_or_else(|| {
                    Error::Config(format!(
                        "No file extensions configured for analysis type '{}'",
                        analysis_type
                    ))
                })?;
                let all = self.client.list_files(repository, &branch).await?;
                all.into_iter()
                    .filter(|path| {
                        let lower = path.to_lowercase();
                        extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
                    })
                    .collect()
            }
        };

        debug!(repository, branch = %branch, count = paths.len(), "Reading repository files");

        let mut contents = BTreeMap::new();
        for path in paths {
            match self.client.read_file(repository, &branch, &path).await? {
                Some(content) => {
                    contents.insert(path, content);
                }
                None => warn!(repository, path = %path, "File not found, skipping"),
            }
        }

        info!(repository, branch = %branch, files = contents.len(), "Read repository files");
        Ok(contents)
    }
}
