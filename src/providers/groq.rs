/// Groq provider — hosted LLM inference via api.groq.com.
/// Groq exposes an OpenAI-compatible `/chat/completions` endpoint,
/// so we reuse the shared OpenAI helpers.
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{build_request_body, parse_openai_completion};
use crate::{AgentError, Completion, CompletionOptions, LlmProvider, Message, Tool};

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "llama3-70b-8192";

pub struct GroqProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl GroqProvider {
    /// `model` – e.g. `"llama3-70b-8192"`, `"llama-3.1-8b-instant"`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AgentError> {
        Self::with_base_url(GROQ_BASE_URL, api_key, model)
    }

    /// Point at another OpenAI-compatible host (a proxy, or a mock server in tests).
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, AgentError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgentError::Config("Groq API key is empty".into()));
        }
        Ok(Self {
            client: Client::new(),
            api_key: api_key.trim().to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: model.into(),
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    fn provider_name(&self) -> &str { "Groq" }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[&dyn Tool],
        model: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, AgentError> {
        let active_model = if model.is_empty() { &self.default_model } else { model };
        let body = build_request_body(active_model, messages, tools, options);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = active_model, messages = messages.len(), tools = tools.len(), "POST {url}");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                provider: self.provider_name().to_string(),
                status,
                body,
            });
        }

        let json: serde_json::Value = response.json().await?;
        parse_openai_completion(&json)
    }
}
