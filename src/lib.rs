pub mod config;
pub mod providers;
pub mod session;
pub mod tools;
pub mod web;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

pub use providers::groq::GroqProvider;
pub use tools::SearchTechnicalDocTool;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an autonomous technical research agent. \
When a question is about a technical topic, call `search_technical_doc` with a short \
lowercase keyword (for example \"rag\" or \"vllm\") and base your answer on what it returns. \
If the local documentation does not cover the topic, say so and answer from general knowledge. \
Keep answers short and precise.";

/// Name of the tool offered by [`Agent::run_structured`] to deliver the final answer.
pub const FINAL_RESULT_TOOL: &str = "final_result";

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM request failed: {0}")]
    LlmError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response from LLM: {0}")]
    InvalidResponse(String),

    #[error("{provider} returned {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {0}")]
    ToolError(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Max iterations reached")]
    MaxIterations,
}

impl AgentError {
    /// Short variant name, shown next to the message in the chat UI.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::LlmError(_) => "LlmError",
            AgentError::Json(_) => "JsonError",
            AgentError::InvalidResponse(_) => "InvalidResponse",
            AgentError::Api { .. } => "ApiError",
            AgentError::ProviderError(_) => "ProviderError",
            AgentError::Config(_) => "ConfigError",
            AgentError::ToolNotFound(_) => "ToolNotFound",
            AgentError::ToolError(_) => "ToolError",
            AgentError::SessionNotFound(_) => "SessionNotFound",
            AgentError::MaxIterations => "MaxIterations",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Value) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Default)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub raw_tool_calls: Option<Value>,
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// Structured result of a turn.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AgentOutput {
    /// The final answer.
    pub answer: String,
    /// Whether any tool was consulted.
    pub used_tools: bool,
}

impl AgentOutput {
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "answer": { "type": "string", "description": "The final answer" },
                "used_tools": { "type": "boolean", "description": "Were any tools consulted?" }
            },
            "required": ["answer", "used_tools"],
            "additionalProperties": false
        })
    }

    /// Accepts a plain-text reply: JSON matching the schema is taken as is,
    /// anything else becomes the answer.
    pub fn from_text(text: &str, used_tools: bool) -> Self {
        match serde_json::from_str::<AgentOutput>(text.trim()) {
            Ok(out) => Self {
                used_tools: out.used_tools || used_tools,
                ..out
            },
            Err(_) => Self {
                answer: text.to_string(),
                used_tools,
            },
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<String, AgentError>;
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[&dyn Tool],
        model: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, AgentError>;
}

/// Advertised to the model in structured runs; the agent intercepts calls to it.
struct FinalResultTool;

#[async_trait]
impl Tool for FinalResultTool {
    fn name(&self) -> &'static str {
        FINAL_RESULT_TOOL
    }

    fn description(&self) -> &'static str {
        "Deliver the final answer. Call this exactly once when you are done."
    }

    fn parameters_schema(&self) -> Value {
        AgentOutput::schema()
    }

    async fn execute(&self, _args: Value) -> Result<String, AgentError> {
        Err(AgentError::ToolError(format!(
            "'{FINAL_RESULT_TOOL}' is handled by the agent"
        )))
    }
}

enum Outcome {
    Text(String),
    Final(AgentOutput),
}

pub struct Agent {
    pub provider: Box<dyn LlmProvider>,
    pub model: String,
    pub tools: Vec<Box<dyn Tool>>,
    pub history: Vec<Message>,
    pub max_steps: usize,
    pub system_prompt: String,
    pub options: CompletionOptions,
    tools_used: Vec<String>,
}

impl Agent {
    pub fn new(provider: Box<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            tools: vec![],
            history: vec![],
            max_steps: 6,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            options: CompletionOptions::default(),
            tools_used: vec![],
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = max_tokens;
        self
    }

    pub fn add_tool<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.push(Box::new(tool));
    }

    /// Names of the tools executed during the most recent run, in call order.
    pub fn tools_used(&self) -> &[String] {
        &self.tools_used
    }

    pub async fn run(&mut self, user_input: &str) -> Result<String, AgentError> {
        match self.drive(user_input, false).await? {
            Outcome::Text(text) => Ok(text),
            Outcome::Final(output) => Ok(output.answer),
        }
    }

    /// Runs a turn and returns an [`AgentOutput`].
    ///
    /// The model is offered a `final_result` tool shaped like the output;
    /// a plain-text reply is accepted too (see [`AgentOutput::from_text`]).
    pub async fn run_structured(&mut self, user_input: &str) -> Result<AgentOutput, AgentError> {
        let output = match self.drive(user_input, true).await? {
            Outcome::Final(output) => output,
            Outcome::Text(text) => AgentOutput::from_text(&text, false),
        };
        Ok(AgentOutput {
            used_tools: output.used_tools || !self.tools_used.is_empty(),
            ..output
        })
    }

    async fn drive(&mut self, user_input: &str, structured: bool) -> Result<Outcome, AgentError> {
        self.tools_used.clear();

        if !self.system_prompt.is_empty() && !self.history.iter().any(|m| m.role == Role::System) {
            self.history.push(Message::system(self.system_prompt.clone()));
        }
        self.history.push(Message::user(user_input));

        let final_tool = FinalResultTool;

        for step in 0..self.max_steps {
            let mut tool_refs: Vec<&dyn Tool> = self.tools.iter().map(|t| t.as_ref()).collect();
            if structured {
                tool_refs.push(&final_tool);
            }

            debug!(
                step,
                provider = self.provider.provider_name(),
                model = %self.model,
                "requesting completion"
            );
            let completion = self
                .provider
                .complete(&self.history, &tool_refs, &self.model, &self.options)
                .await?;

            self.history.push(Message::assistant_with_tools(
                completion.content.clone().unwrap_or_default(),
                completion.raw_tool_calls.clone().unwrap_or(Value::Null),
            ));

            if !completion.tool_calls.is_empty() {
                if structured {
                    if let Some(call) = completion
                        .tool_calls
                        .iter()
                        .find(|c| c.name == FINAL_RESULT_TOOL)
                    {
                        let output: AgentOutput = serde_json::from_value(call.args.clone())
                            .map_err(|e| {
                                AgentError::InvalidResponse(format!(
                                    "'{FINAL_RESULT_TOOL}' arguments do not match the output schema: {e}"
                                ))
                            })?;
                        info!(steps = step + 1, "structured answer received");
                        return Ok(Outcome::Final(output));
                    }
                }

                for call in &completion.tool_calls {
                    info!(tool = %call.name, "executing tool");
                    let result = self.execute_tool(call).await?;
                    self.tools_used.push(call.name.clone());
                    self.history.push(Message::tool_result(call.id.clone(), result));
                }
                // Loop again for the model to see tool results
                continue;
            }

            return match completion.content {
                Some(content) if !content.trim().is_empty() => Ok(Outcome::Text(content)),
                _ => Err(AgentError::ProviderError("Empty response from model".into())),
            };
        }

        Err(AgentError::MaxIterations)
    }

    async fn execute_tool(&self, call: &ToolCall) -> Result<String, AgentError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tool.execute(call.args.clone()).await
    }
}
