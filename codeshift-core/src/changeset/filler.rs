//! Changeset filler
//!
//! The grouping stage only references files by path (plus an optional
//! rationale); the refactor stage carries the full content. The filler joins
//! the two by path and produces groups where every change is complete and
//! committable. Anything inconsistent between the two documents is dropped
//! and reported, never fatal.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error, warn};

use super::file_change::{ChangeStatus, FileChange};

/// Key holding the overall summary in a grouping result
pub const SUMMARY_KEY: &str = "resumo_geral";
/// Key holding the change list in refactor results and groups
pub const CHANGES_KEY: &str = "conjunto_de_mudancas";
/// Key holding the file path in a change record
pub const PATH_KEY: &str = "caminho_do_arquivo";
/// Key holding the rationale in a change record
pub const RATIONALE_KEY: &str = "justificativa";
/// Key holding file content in a change record
pub const CONTENT_KEY: &str = "conteudo";
/// Older name for [`CONTENT_KEY`]
pub const LEGACY_CONTENT_KEY: &str = "codigo_novo";

const STATUS_KEY: &str = "status";
const PR_TITLE_KEY: &str = "resumo_do_pr";
const PR_BODY_KEY: &str = "descricao_do_pr";

/// One branch/PR worth of complete changes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilledGroup {
    /// Short PR summary, used as the PR title
    #[serde(rename = "resumo_do_pr", default, skip_serializing_if = "Option::is_none")]
    pub pr_title: Option<String>,

    /// Long PR description, used as the PR body
    #[serde(rename = "descricao_do_pr", default, skip_serializing_if = "Option::is_none")]
    pub pr_body: Option<String>,

    /// Complete change records
    #[serde(rename = "conjunto_de_mudancas")]
    pub changes: Vec<FileChange>,

    /// Any other fields the grouping stage put on the group
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Grouping result with every reference replaced by its complete record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilledChangeset {
    /// Overall summary, copied through unchanged
    #[serde(rename = "resumo_geral", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,

    /// Groups keyed by branch name, in grouping-stage order
    #[serde(flatten)]
    pub groups: IndexMap<String, FilledGroup>,
}

impl FilledChangeset {
    /// An empty changeset means there is nothing to commit
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.groups.is_empty()
    }

    /// Total number of file changes across all groups
    pub fn change_count(&self) -> usize {
        self.groups.values().map(|g| g.changes.len()).sum()
    }
}

/// Why a grouping reference did not make it into the filled changeset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Reference had no path
    EmptyPath,
    /// Path never produced by the refactor stage
    NotInRefactor,
    /// Record could not be read as a file change
    Malformed(String),
    /// No content and not a removal
    NoContent,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::EmptyPath => write!(f, "reference has no file path"),
            DropReason::NotInRefactor => write!(f, "file not present in refactor result"),
            DropReason::Malformed(e) => write!(f, "malformed change record: {}", e),
            DropReason::NoContent => write!(f, "no content and not marked as removed"),
        }
    }
}

/// A dropped grouping reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedChange {
    pub group: String,
    pub path: Option<String>,
    pub reason: DropReason,
}

impl fmt::Display for DroppedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "group '{}', file '{}': {}",
            self.group,
            self.path.as_deref().unwrap_or(""),
            self.reason
        )
    }
}

/// Outcome of a reconciliation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub changeset: FilledChangeset,
    pub dropped: Vec<DroppedChange>,
}

/// Reconcile a grouping result with the refactor result it was derived from
///
/// Returns an empty changeset when the refactor result is missing, is not an
/// object, or has no changes.
pub fn reconcile(grouping: Option<&Value>, refactor: Option<&Value>) -> Reconciliation {
    let mut outcome = Reconciliation::default();

    let Some(records) = refactor_records(refactor) else {
        warn!("Refactor result has no changes; nothing to fill");
        return outcome;
    };

    let lookup = index_by_path(records);
    debug!(files = lookup.len(), "Indexed refactor changes by path");

    let Some(grouping) = grouping.and_then(Value::as_object) else {
        warn!("Grouping result is not an object; nothing to fill");
        return outcome;
    };

    for (name, entry) in grouping {
        if name == SUMMARY_KEY {
            outcome.changeset.summary = Some(entry.clone());
            continue;
        }

        let Some(group) = entry.as_object() else {
            debug!(group = %name, "Skipping non-object group");
            continue;
        };
        let Some(references) = group.get(CHANGES_KEY).and_then(Value::as_array) else {
            debug!(group = %name, "Skipping group without change list");
            continue;
        };

        let mut changes = Vec::with_capacity(references.len());
        for reference in references {
            match fill_reference(reference, &lookup) {
                Ok(change) => changes.push(change),
                Err((path, reason)) => {
                    match reason {
                        DropReason::NotInRefactor => error!(
                            group = %name,
                            path = path.as_deref().unwrap_or(""),
                            "Grouped file missing from refactor result, dropping"
                        ),
                        _ => warn!(
                            group = %name,
                            path = path.as_deref().unwrap_or(""),
                            reason = %reason,
                            "Dropping change"
                        ),
                    }
                    outcome.dropped.push(DroppedChange {
                        group: name.clone(),
                        path,
                        reason,
                    });
                }
            }
        }

        if changes.is_empty() {
            warn!(group = %name, "Group has no valid changes, dropping group");
            continue;
        }

        outcome
            .changeset
            .groups
            .insert(name.clone(), build_group(group, changes));
    }

    outcome
}

fn refactor_records(refactor: Option<&Value>) -> Option<&Vec<Value>> {
    refactor?
        .as_object()?
        .get(CHANGES_KEY)?
        .as_array()
        .filter(|records| !records.is_empty())
}

/// Later records win when a path repeats
fn index_by_path(records: &[Value]) -> HashMap<&str, &Map<String, Value>> {
    records
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|record| {
            record
                .get(PATH_KEY)
                .and_then(Value::as_str)
                .filter(|path| !path.is_empty())
                .map(|path| (path, record))
        })
        .collect()
}

fn fill_reference(
    reference: &Value,
    lookup: &HashMap<&str, &Map<String, Value>>,
) -> Result<FileChange, (Option<String>, DropReason)> {
    let path = reference
        .get(PATH_KEY)
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
        .ok_or((None, DropReason::EmptyPath))?;

    let full = lookup
        .get(path)
        .ok_or_else(|| (Some(path.to_string()), DropReason::NotInRefactor))?;

    let mut record = (*full).clone();

    if let Some(rationale) = reference
        .get(RATIONALE_KEY)
        .and_then(Value::as_str)
        .filter(|r| !r.is_empty())
    {
        record.insert(RATIONALE_KEY.to_string(), Value::String(rationale.to_string()));
    }
    if !record.get(RATIONALE_KEY).is_some_and(Value::is_string) {
        record.remove(RATIONALE_KEY);
    }

    let legacy = record.remove(LEGACY_CONTENT_KEY);
    if record.get(CONTENT_KEY).map_or(true, Value::is_null) {
        if let Some(legacy) = legacy {
            record.insert(CONTENT_KEY.to_string(), legacy);
        }
    }

    let removed =
        record.get(STATUS_KEY).and_then(Value::as_str) == Some(ChangeStatus::Removed.as_str());
    if !removed && record.get(CONTENT_KEY).map_or(true, Value::is_null) {
        return Err((Some(path.to_string()), DropReason::NoContent));
    }

    // Content decides acceptance; an absent or unrecognized status is a rewrite
    let recognized = record
        .get(STATUS_KEY)
        .and_then(|status| serde_json::from_value::<ChangeStatus>(status.clone()).ok())
        .is_some();
    if !recognized {
        debug!(path, status = ?record.get(STATUS_KEY), "Treating change as a modification");
        record.insert(
            STATUS_KEY.to_string(),
            Value::String(ChangeStatus::Modified.as_str().to_string()),
        );
    }

    let change: FileChange = serde_json::from_value(Value::Object(record))
        .map_err(|e| (Some(path.to_string()), DropReason::Malformed(e.to_string())))?;

    if !change.is_committable() {
        return Err((Some(path.to_string()), DropReason::NoContent));
    }

    Ok(change)
}

fn build_group(group: &Map<String, Value>, changes: Vec<FileChange>) -> FilledGroup {
    let mut filled = FilledGroup {
        changes,
        ..Default::default()
    };

    for (key, value) in group {
        match (key.as_str(), value) {
            (CHANGES_KEY, _) => {}
            (PR_TITLE_KEY, Value::String(title)) => filled.pr_title = Some(title.clone()),
            (PR_BODY_KEY, Value::String(body)) => filled.pr_body = Some(body.clone()),
            _ => {
                filled.extra.insert(key.clone(), value.clone());
            }
        }
    }

    filled
}
