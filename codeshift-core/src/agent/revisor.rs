//! Revisor: analyzes repository files

use super::{AgentInput, AgentKind, AgentPayload, AgentStrategy, StepContext};
use crate::Result;

/// Reads the job's repository and judges it
///
/// Extra instructions are the job instructions, then the previous step's
/// result (from step 1 on), then any approval feedback.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevisorAgent;

impl AgentStrategy for RevisorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Revisor
    }

    fn build_input(&self, ctx: &StepContext<'_>) -> Result<AgentInput> {
        let mut sections = Vec::new();

        if let Some(instructions) = ctx.instructions() {
            sections.push(instructions.to_string());
        }

        if ctx.index > 0 {
            let previous = serde_json::to_string_pretty(ctx.previous.value())?;
            sections.push(format!(
                "Context from the previous step:\n```json\n{}\n```",
                previous
            ));
        }

        if let Some(feedback) = ctx.feedback() {
            sections.push(format!("Approval feedback:\n{}", feedback));
        }

        Ok(AgentInput {
            kind: AgentKind::Revisor,
            task_type: ctx.task_type(),
            payload: AgentPayload::Repository {
                repository: ctx.job.repository.clone(),
                analysis_type: ctx.job.analysis_type.clone(),
                branch: ctx.job.branch.clone(),
                files: ctx.step.params.files(),
            },
            extra_instructions: sections.join("\n\n"),
            use_rag: ctx.step.params.use_rag(),
            model_name: ctx.model_name.map(str::to_string),
            max_tokens: ctx.max_tokens(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobData, StepResult};
    use crate::workflow::{Step, StepParams};
    use serde_json::json;

    fn job() -> JobData {
        JobData {
            repository: "acme/api".to_string(),
            analysis_type: "refatoracao".to_string(),
            branch: Some("develop".to_string()),
            instructions: Some("Focus on security".to_string()),
            ..Default::default()
        }
    }

    fn step(params: serde_json::Value) -> Step {
        Step {
            agent_type: "revisor".to_string(),
            status_update: "analyzing".to_string(),
            model_name: None,
            requires_approval: false,
            params: serde_json::from_value::<StepParams>(params).unwrap(),
        }
    }

    #[test]
    fn test_first_step_has_no_context_block() {
        let job = job();
        let step = step(json!({"tipo_analise": "seguranca", "max_token_out": 500}));
        let previous = StepResult::empty();
        let ctx = StepContext {
            job: &job,
            step: &step,
            index: 0,
            previous: &previous,
            approval_feedback: None,
            model_name: Some("gpt-4o"),
            default_max_tokens: 15_000,
        };

        let input = RevisorAgent.build_input(&ctx).unwrap();

        assert_eq!(input.task_type, "seguranca");
        assert_eq!(input.max_tokens, 500);
        assert_eq!(input.extra_instructions, "Focus on security");
        assert_eq!(input.model_name.as_deref(), Some("gpt-4o"));
        assert_eq!(
            input.payload,
            AgentPayload::Repository {
                repository: "acme/api".to_string(),
                analysis_type: "refatoracao".to_string(),
                branch: Some("develop".to_string()),
                files: None,
            }
        );
    }

    #[test]
    fn test_later_step_embeds_previous_and_feedback() {
        let job = job();
        let step = step(json!({}));
        let previous = StepResult::report("R");
        let ctx = StepContext {
            job: &job,
            step: &step,
            index: 2,
            previous: &previous,
            approval_feedback: Some("Skip tests"),
            model_name: None,
            default_max_tokens: 15_000,
        };

        let input = RevisorAgent.build_input(&ctx).unwrap();
        let extra = &input.extra_instructions;

        assert_eq!(input.task_type, "refatoracao");
        assert_eq!(input.max_tokens, 15_000);
        assert!(extra.starts_with("Focus on security"));
        assert!(extra.contains("\"relatorio\": \"R\""));
        assert!(extra.ends_with("Approval feedback:\nSkip tests"));
    }
}
