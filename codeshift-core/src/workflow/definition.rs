//! Workflow catalog loaded from YAML
//!
//! ```yaml
//! extensions:
//!   refatoracao: [".py", ".pyi"]
//! workflows:
//!   refatoracao:
//!     description: Refactor and open stacked PRs
//!     steps:
//!       - agent_type: revisor
//!         status_update: analyzing
//!         requires_approval: true
//!         params: { tipo_analise: refatoracao }
//!       - agent_type: processador
//!         status_update: refactoring
//!         params: { tipo_analise: refatoracao_codigo }
//!       - agent_type: processador
//!         status_update: grouping
//!         params: { tipo_analise: agrupamento_commits }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

use crate::agent::AgentKind;
use crate::hosting::ExtensionTable;
use crate::{Error, Result};

const TASK_TYPE_KEY: &str = "tipo_analise";
const USE_RAG_KEY: &str = "usar_rag";
const MAX_TOKENS_KEY: &str = "max_token_out";
const FILES_KEY: &str = "arquivos_especificos";

/// Opaque per-step parameters, passed through to the agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepParams(Map<String, Value>);

impl StepParams {
    pub fn new(params: Map<String, Value>) -> Self {
        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Task type sent to the LLM (`tipo_analise`)
    pub fn task_type(&self) -> Option<&str> {
        self.0
            .get(TASK_TYPE_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Retrieval augmentation flag (`usar_rag`)
    pub fn use_rag(&self) -> bool {
        self.0
            .get(USE_RAG_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Output token limit (`max_token_out`)
    pub fn max_tokens(&self) -> Option<u32> {
        self.0
            .get(MAX_TOKENS_KEY)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }

    /// Explicit file list (`arquivos_especificos`), bypassing extension filtering
    pub fn files(&self) -> Option<Vec<String>> {
        let files: Vec<String> = self
            .0
            .get(FILES_KEY)?
            .as_array()?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if files.is_empty() {
            None
        } else {
            Some(files)
        }
    }
}

/// One step of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// `revisor` or `processador`; checked when the step runs
    pub agent_type: String,

    /// Job status while this step runs
    #[serde(default)]
    pub status_update: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    #[serde(default)]
    pub requires_approval: bool,

    #[serde(default)]
    pub params: StepParams,
}

impl Step {
    /// Parse the declared agent type
    pub fn agent_kind(&self) -> Result<AgentKind> {
        self.agent_type
            .parse()
            .map_err(|_| Error::UnknownAgentType(self.agent_type.clone()))
    }

    /// Status label, `step_<i>` when none is declared
    pub fn status_label(&self, index: usize) -> String {
        if self.status_update.trim().is_empty() {
            format!("step_{}", index)
        } else {
            self.status_update.clone()
        }
    }
}

/// A named, ordered list of steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub description: String,
    pub steps: Vec<Step>,
}

/// All workflows plus the analysis-type extension table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCatalog {
    #[serde(default)]
    pub extensions: ExtensionTable,
    #[serde(default)]
    pub workflows: IndexMap<String, WorkflowDefinition>,
}

impl WorkflowCatalog {
    /// Parse a catalog from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a catalog from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read workflow catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        let catalog = Self::from_yaml_str(&contents)?;
        info!(
            path = %path.display(),
            workflows = catalog.workflows.len(),
            "Loaded workflow catalog"
        );
        Ok(catalog)
    }

    /// Look up a workflow by its analysis-type key
    pub fn get(&self, key: &str) -> Result<&WorkflowDefinition> {
        self.workflows
            .get(key)
            .ok_or_else(|| Error::UnknownWorkflow(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.workflows.contains_key(key)
    }

    /// Problems that will fail jobs at run time
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (key, workflow) in &self.workflows {
            if workflow.steps.is_empty() {
                problems.push(format!("workflow '{}' has no steps", key));
            }
            for (index, step) in workflow.steps.iter().enumerate() {
                match step.agent_kind() {
                    Ok(AgentKind::Revisor) if !self.extensions.contains(key) => {
                        if step.params.files().is_none() {
                            problems.push(format!(
                                "workflow '{}' step {}: no file extensions configured",
                                key, index
                            ));
                        }
                    }
                    Ok(_) => {}
                    Err(e) => problems.push(format!("workflow '{}' step {}: {}", key, index, e)),
                }
            }
        }
        problems
    }
}
