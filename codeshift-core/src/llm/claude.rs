//! Anthropic messages API provider

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{LlmProvider, LlmRequest, LlmResponse, PromptLibrary, ProviderKind};
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const API_VERSION: &str = "2023-06-01";

/// Calls `POST {base_url}/v1/messages`
#[derive(Clone)]
pub struct ClaudeProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    prompts: PromptLibrary,
}

impl ClaudeProvider {
    /// Create a provider with default endpoint and model
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            prompts: PromptLibrary::embedded(),
        }
    }

    /// Use a custom API endpoint
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Model used when a request names none
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }
}

impl std::fmt::Debug for ClaudeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl MessagesResponse {
    fn into_response(self) -> LlmResponse {
        let text = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        let (tokens_in, tokens_out) = self
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or_default();
        LlmResponse {
            text,
            tokens_in,
            tokens_out,
        }
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    async fn run(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let model = request.model_name.as_deref().unwrap_or(&self.model);
        let system = self
            .prompts
            .system_prompt(&request.task_type, &request.extra_instructions)
            .await?;

        let body = json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "system": system,
            "messages": [
                {"role": "user", "content": request.prompt},
            ],
        });

        debug!(model, task_type = %request.task_type, use_rag = request.use_rag, "Calling Claude");

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("Claude request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response".to_string());
            return Err(Error::Llm(format!(
                "Claude request failed with status {}: {}",
                status, text
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("Failed to parse Claude response: {}", e)))?;
        let result = parsed.into_response();

        info!(
            model,
            tokens_in = result.tokens_in,
            tokens_out = result.tokens_out,
            "Claude completion finished"
        );
        Ok(result)
    }
}
