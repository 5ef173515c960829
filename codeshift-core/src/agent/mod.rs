//! Step agents
//!
//! Each agent kind is a strategy that turns a job, a step and the previous
//! step's result into an [`AgentInput`]. [`invoke`] then runs that input
//! against a repository reader and an LLM provider.

mod output;
mod processador;
mod revisor;
mod types;

pub use output::{parse_output, strip_code_fences, ParsedOutput};
pub use processador::{ProcessadorAgent, APPROVAL_FEEDBACK_KEY, EXTRA_INSTRUCTIONS_KEY, INITIAL_INPUT_KEY};
pub use revisor::RevisorAgent;
pub use types::AgentKind;

use serde_json::Value;
use tracing::debug;

use crate::hosting::RepositoryReader;
use crate::job::{JobData, StepResult};
use crate::llm::{LlmProvider, LlmRequest, LlmResponse};
use crate::workflow::Step;
use crate::{Error, Result};

/// Everything a strategy may look at when building its input
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub job: &'a JobData,
    pub step: &'a Step,
    /// Absolute index of the step in its workflow
    pub index: usize,
    /// Result of step `index - 1`, or an empty object
    pub previous: &'a StepResult,
    /// One-shot feedback from the last approval
    pub approval_feedback: Option<&'a str>,
    /// Model already resolved for this step
    pub model_name: Option<&'a str>,
    /// Token limit when the step sets none
    pub default_max_tokens: u32,
}

impl StepContext<'_> {
    /// Task type from the step params, else the job's analysis type
    pub fn task_type(&self) -> String {
        self.step
            .params
            .task_type()
            .unwrap_or(&self.job.analysis_type)
            .to_string()
    }

    pub fn max_tokens(&self) -> u32 {
        self.step
            .params
            .max_tokens()
            .unwrap_or(self.default_max_tokens)
    }

    /// Job-level free-text instructions, if any
    pub fn instructions(&self) -> Option<&str> {
        self.job
            .instructions
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn feedback(&self) -> Option<&str> {
        self.approval_feedback.filter(|s| !s.trim().is_empty())
    }
}

/// What the agent works on
#[derive(Debug, Clone, PartialEq)]
pub enum AgentPayload {
    /// Files read from a repository
    Repository {
        repository: String,
        analysis_type: String,
        branch: Option<String>,
        files: Option<Vec<String>>,
    },
    /// A JSON document to transform
    Document(Value),
}

/// Fully prepared agent invocation
#[derive(Debug, Clone, PartialEq)]
pub struct AgentInput {
    pub kind: AgentKind,
    pub task_type: String,
    pub payload: AgentPayload,
    pub extra_instructions: String,
    pub use_rag: bool,
    pub model_name: Option<String>,
    pub max_tokens: u32,
}

/// Per-kind input construction
pub trait AgentStrategy: Send + Sync {
    fn kind(&self) -> AgentKind;

    fn build_input(&self, ctx: &StepContext<'_>) -> Result<AgentInput>;
}

static REVISOR: RevisorAgent = RevisorAgent;
static PROCESSADOR: ProcessadorAgent = ProcessadorAgent;

/// Strategy implementing an agent kind
pub fn strategy_for(kind: AgentKind) -> &'static dyn AgentStrategy {
    match kind {
        AgentKind::Revisor => &REVISOR,
        AgentKind::Processador => &PROCESSADOR,
    }
}

/// Run a prepared input
pub async fn invoke(
    input: &AgentInput,
    reader: &dyn RepositoryReader,
    llm: &dyn LlmProvider,
) -> Result<LlmResponse> {
    let prompt = match &input.payload {
        AgentPayload::Repository {
            repository,
            analysis_type,
            branch,
            files,
        } => {
            let contents = reader
                .read(repository, analysis_type, branch.as_deref(), files.as_deref())
                .await?;
            if contents.is_empty() {
                return Err(Error::Agent(format!(
                    "No files to analyze in {} for '{}'",
                    repository, analysis_type
                )));
            }
            serde_json::to_string_pretty(&contents)?
        }
        AgentPayload::Document(document) => serde_json::to_string_pretty(document)?,
    };

    debug!(
        kind = %input.kind,
        task_type = %input.task_type,
        prompt_len = prompt.len(),
        "Invoking agent"
    );

    let request = LlmRequest {
        task_type: input.task_type.clone(),
        prompt,
        extra_instructions: input.extra_instructions.clone(),
        use_rag: input.use_rag,
        model_name: input.model_name.clone(),
        max_tokens: input.max_tokens,
    };
    llm.run(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::{ExtensionTable, HostedRepositoryReader, RepositoryKind};
    use crate::llm::ProviderKind;
    use crate::test_support::{FakeHosting, ScriptedLlm};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn reader(hosting: FakeHosting) -> HostedRepositoryReader {
        let table = ExtensionTable::new(HashMap::from([(
            "refatoracao".to_string(),
            vec![".py".to_string()],
        )]));
        HostedRepositoryReader::new(Arc::new(hosting), Arc::new(table))
    }

    fn input(payload: AgentPayload) -> AgentInput {
        AgentInput {
            kind: AgentKind::Revisor,
            task_type: "refatoracao".to_string(),
            payload,
            extra_instructions: "be brief".to_string(),
            use_rag: false,
            model_name: Some("gpt-4o".to_string()),
            max_tokens: 100,
        }
    }

    #[tokio::test]
    async fn test_invoke_repository_payload() {
        let hosting = FakeHosting::new(RepositoryKind::Github);
        hosting.put_file("main", "app.py", "print(1)");
        let llm = ScriptedLlm::new(ProviderKind::OpenAi).respond("{\"relatorio\": \"ok\"}");

        let response = invoke(
            &input(AgentPayload::Repository {
                repository: "acme/api".to_string(),
                analysis_type: "refatoracao".to_string(),
                branch: None,
                files: None,
            }),
            &reader(hosting),
            &llm,
        )
        .await
        .unwrap();

        assert_eq!(response.text, "{\"relatorio\": \"ok\"}");
        let request = llm.requests().pop().unwrap();
        assert!(request.prompt.contains("app.py"));
        assert!(request.prompt.contains("print(1)"));
        assert_eq!(request.extra_instructions, "be brief");
    }

    #[tokio::test]
    async fn test_invoke_no_files_is_error() {
        let hosting = FakeHosting::new(RepositoryKind::Github);
        hosting.put_file("main", "README.md", "docs");
        let llm = ScriptedLlm::new(ProviderKind::OpenAi);

        let result = invoke(
            &input(AgentPayload::Repository {
                repository: "acme/api".to_string(),
                analysis_type: "refatoracao".to_string(),
                branch: None,
                files: None,
            }),
            &reader(hosting),
            &llm,
        )
        .await;

        assert!(matches!(result, Err(Error::Agent(_))));
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_document_payload() {
        let llm = ScriptedLlm::new(ProviderKind::Claude).respond("{}");
        let hosting = FakeHosting::new(RepositoryKind::Github);

        invoke(
            &input(AgentPayload::Document(json!({"instrucoes_iniciais": "x"}))),
            &reader(hosting),
            &llm,
        )
        .await
        .unwrap();

        let request = llm.requests().pop().unwrap();
        assert!(request.prompt.contains("instrucoes_iniciais"));
    }
}
