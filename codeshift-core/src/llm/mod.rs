//! LLM provider abstraction

pub mod claude;
pub mod openai;
pub mod prompts;

pub use claude::ClaudeProvider;
pub use openai::OpenAiProvider;
pub use prompts::{PromptContext, PromptLibrary};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// Which family of LLM API to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    #[serde(alias = "open_ai")]
    OpenAi,
    #[serde(alias = "anthropic")]
    Claude,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
        }
    }

    /// Infer the provider from a model name
    ///
    /// Names containing "claude" (any case) go to Claude, everything else to OpenAI.
    pub fn for_model(model: &str) -> Self {
        if model.to_lowercase().contains("claude") {
            ProviderKind::Claude
        } else {
            ProviderKind::OpenAi
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "open_ai" => Ok(ProviderKind::OpenAi),
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

/// A single LLM invocation
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// Task type, selects the prompt template
    pub task_type: String,
    /// Main payload: source files or the structured input to transform
    pub prompt: String,
    /// Job instructions, previous-step context and approval feedback
    pub extra_instructions: String,
    /// Whether retrieval augmentation was requested for this step
    pub use_rag: bool,
    /// Model to use; the provider default when absent
    pub model_name: Option<String>,
    pub max_tokens: u32,
}

/// Generated text plus token usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// A backend able to run a task against an LLM
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider family this implementation serves
    fn kind(&self) -> ProviderKind;

    /// Run one completion
    async fn run(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// Registry of LLM providers by kind
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own kind
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Get a provider by kind
    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn LlmProvider>> {
        self.providers.get(&kind).cloned().ok_or_else(|| {
            Error::Config(format!(
                "No {} provider configured (missing API key?)",
                kind
            ))
        })
    }

    /// Pick the provider for a step
    ///
    /// An explicit kind wins; otherwise it is inferred from the model name,
    /// defaulting to OpenAI when there is no model either.
    pub fn resolve(
        &self,
        explicit: Option<ProviderKind>,
        model: Option<&str>,
    ) -> Result<Arc<dyn LlmProvider>> {
        let kind = explicit
            .or_else(|| model.map(ProviderKind::for_model))
            .unwrap_or_default();
        self.get(kind)
    }

    /// List registered providers
    pub fn list_registered(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.name());
        kinds
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_registered())
            .finish()
    }
}
