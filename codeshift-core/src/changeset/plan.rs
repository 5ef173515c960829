//! Commit-ready branch plans derived from a filled changeset

use serde::{Deserialize, Serialize};

use super::file_change::FileChange;
use super::filler::FilledChangeset;

/// Changes destined for a single branch and pull request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchChangeset {
    pub branch_name: String,
    pub pr_title: String,
    pub pr_body: String,
    pub changes: Vec<FileChange>,
}

impl FilledChangeset {
    /// One plan per group, in grouping order; the overall summary is not a branch
    ///
    /// A group without a PR summary is titled after its branch.
    pub fn branch_plans(&self) -> Vec<BranchChangeset> {
        self.groups
            .iter()
            .map(|(name, group)| BranchChangeset {
                branch_name: name.clone(),
                pr_title: group
                    .pr_title
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| name.clone()),
                pr_body: group.pr_body.clone().unwrap_or_default(),
                changes: group.changes.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::{reconcile, ChangeStatus};
    use serde_json::json;

    #[test]
    fn test_branch_plans_follow_group_order() {
        let refactor = json!({"conjunto_de_mudancas": [
            {"caminho_do_arquivo": "a.py", "status": "MODIFICADO", "conteudo": "A"},
            {"caminho_do_arquivo": "b.py", "status": "REMOVIDO"}
        ]});
        let grouping = json!({
            "resumo_geral": "summary",
            "fix/b": {"resumo_do_pr": "Remove b", "descricao_do_pr": "b is dead", "conjunto_de_mudancas": [
                {"caminho_do_arquivo": "b.py"}
            ]},
            "fix/a": {"conjunto_de_mudancas": [{"caminho_do_arquivo": "a.py"}]}
        });

        let plans = reconcile(Some(&grouping), Some(&refactor))
            .changeset
            .branch_plans();

        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].branch_name, "fix/b");
        assert_eq!(plans[0].pr_title, "Remove b");
        assert_eq!(plans[0].pr_body, "b is dead");
        assert_eq!(plans[0].changes[0].status, ChangeStatus::Removed);
        assert_eq!(plans[1].branch_name, "fix/a");
        assert_eq!(plans[1].pr_title, "fix/a");
        assert_eq!(plans[1].pr_body, "");
    }

    #[test]
    fn test_empty_changeset_has_no_plans() {
        assert!(FilledChangeset::default().branch_plans().is_empty());
    }
}
