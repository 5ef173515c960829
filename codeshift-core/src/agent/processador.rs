//! Processador: transforms a structured payload

use serde_json::{Map, Value};

use super::{AgentInput, AgentKind, AgentPayload, AgentStrategy, StepContext};
use crate::Result;

/// Field holding the payload to transform
pub const INITIAL_INPUT_KEY: &str = "instrucoes_iniciais";
/// Field receiving job instructions when merged into a mapping
pub const EXTRA_INSTRUCTIONS_KEY: &str = "instrucoes_extras";
/// Field receiving approval feedback when merged into a mapping
pub const APPROVAL_FEEDBACK_KEY: &str = "feedback_aprovacao";

/// Transforms the previous result (or, at step 0, the job instructions)
///
/// Job instructions and approval feedback are merged into the target: a
/// string target gets a labelled block appended, a mapping target gets a
/// named key, and anything else gets the text as a sibling top-level key.
/// At step 0 the target already is the job instructions, so only feedback
/// is merged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessadorAgent;

fn merge_text(
    target: &mut Value,
    siblings: &mut Map<String, Value>,
    key: &str,
    label: &str,
    text: &str,
) {
    match target {
        Value::String(existing) => {
            existing.push_str(&format!("\n\n--- {} ---\n{}", label, text));
        }
        Value::Object(map) => {
            map.insert(key.to_string(), Value::String(text.to_string()));
        }
        _ => {
            siblings.insert(key.to_string(), Value::String(text.to_string()));
        }
    }
}

impl AgentStrategy for ProcessadorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Processador
    }

    fn build_input(&self, ctx: &StepContext<'_>) -> Result<AgentInput> {
        let mut target = if ctx.index == 0 {
            ctx.instructions()
                .map(|s| Value::String(s.to_string()))
                .unwrap_or(Value::Null)
        } else {
            ctx.previous.value().clone()
        };
        let mut siblings = Map::new();

        if ctx.index > 0 {
            if let Some(instructions) = ctx.instructions() {
                merge_text(
                    &mut target,
                    &mut siblings,
                    EXTRA_INSTRUCTIONS_KEY,
                    "Additional instructions",
                    instructions,
                );
            }
        }

        if let Some(feedback) = ctx.feedback() {
            merge_text(
                &mut target,
                &mut siblings,
                APPROVAL_FEEDBACK_KEY,
                "Approval feedback",
                feedback,
            );
        }

        let mut document = Map::new();
        document.insert(INITIAL_INPUT_KEY.to_string(), target);
        document.extend(siblings);

        Ok(AgentInput {
            kind: AgentKind::Processador,
            task_type: ctx.task_type(),
            payload: AgentPayload::Document(Value::Object(document)),
            extra_instructions: String::new(),
            use_rag: ctx.step.params.use_rag(),
            model_name: ctx.model_name.map(str::to_string),
            max_tokens: ctx.max_tokens(),
        })
    }
}
