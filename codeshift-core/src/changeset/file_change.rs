//! File-level change records produced by the refactor stage

use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens to a file when a change is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeStatus {
    /// New file (`CRIADO` is accepted as a synonym)
    #[serde(rename = "ADICIONADO", alias = "CRIADO")]
    Added,
    /// Existing file rewritten with new content
    #[serde(rename = "MODIFICADO")]
    Modified,
    /// File deleted; carries no content
    #[serde(rename = "REMOVIDO")]
    Removed,
}

impl ChangeStatus {
    /// Wire name of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Added => "ADICIONADO",
            ChangeStatus::Modified => "MODIFICADO",
            ChangeStatus::Removed => "REMOVIDO",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A complete, commit-ready change to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Repository-relative path; unique within a change set
    #[serde(rename = "caminho_do_arquivo")]
    pub path: String,

    /// Kind of change
    pub status: ChangeStatus,

    /// Full new content; `None` only for removals
    #[serde(rename = "conteudo", default)]
    pub content: Option<String>,

    /// Rationale for the change
    #[serde(
        rename = "justificativa",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rationale: Option<String>,
}

impl FileChange {
    /// Create a change that adds or rewrites a file
    pub fn write(path: impl Into<String>, status: ChangeStatus, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status,
            content: Some(content.into()),
            rationale: None,
        }
    }

    /// Create a change that deletes a file
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: ChangeStatus::Removed,
            content: None,
            rationale: None,
        }
    }

    /// Attach a rationale
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// A change can be committed when it has content or deletes the file
    pub fn is_committable(&self) -> bool {
        self.content.is_some() || self.status == ChangeStatus::Removed
    }
}
