//! Runtime settings, read from command-line flags with environment fallbacks.

use std::time::Duration;

use clap::{Args, ValueEnum};

use crate::providers::groq::{DEFAULT_GROQ_MODEL, GROQ_BASE_URL};
use crate::{Agent, AgentError, AgentOutput, LlmProvider, SearchTechnicalDocTool, DEFAULT_SYSTEM_PROMPT};

/// How the agent is asked to shape its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputMode {
    /// Free text; `used_tools` is derived from the tools that actually ran.
    Text,
    /// The model must deliver `{answer, used_tools}` through the `final_result` tool.
    #[default]
    Structured,
}

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Address to bind the chat server to.
    #[arg(long, global = true, env = "RESEARCH_AGENT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, global = true, env = "RESEARCH_AGENT_PORT", default_value_t = 8501)]
    pub port: u16,

    /// Model served by the completion endpoint.
    #[arg(long, global = true, env = "RESEARCH_AGENT_MODEL", default_value = DEFAULT_GROQ_MODEL)]
    pub model: String,

    /// OpenAI-compatible base URL (`/chat/completions` is appended).
    #[arg(long, global = true, env = "RESEARCH_AGENT_BASE_URL", default_value = GROQ_BASE_URL)]
    pub base_url: String,

    #[arg(long, global = true, env = "RESEARCH_AGENT_SYSTEM_PROMPT", default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Upper bound on model round-trips per turn.
    #[arg(long, global = true, env = "RESEARCH_AGENT_MAX_STEPS", default_value_t = 6)]
    pub max_steps: usize,

    #[arg(long, global = true, env = "RESEARCH_AGENT_TEMPERATURE", default_value_t = 0.7)]
    pub temperature: f32,

    #[arg(long, global = true, env = "RESEARCH_AGENT_MAX_TOKENS", default_value_t = 1024)]
    pub max_tokens: u32,

    #[arg(long, global = true, env = "RESEARCH_AGENT_OUTPUT", value_enum, default_value_t = OutputMode::Structured)]
    pub output: OutputMode,

    /// Minutes a session may sit idle before its key and transcript are dropped.
    #[arg(long, global = true, env = "RESEARCH_AGENT_SESSION_TTL_MINUTES", default_value_t = 60)]
    pub session_ttl_minutes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            model: DEFAULT_GROQ_MODEL.to_string(),
            base_url: GROQ_BASE_URL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_steps: 6,
            temperature: 0.7,
            max_tokens: 1024,
            output: OutputMode::default(),
            session_ttl_minutes: 60,
        }
    }
}

impl Settings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Idle timeout for sessions, never shorter than one minute.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_minutes.max(1) * 60)
    }

    /// A fresh agent for one turn, with the knowledge-base tool registered.
    pub fn agent(&self, provider: Box<dyn LlmProvider>) -> Agent {
        let mut agent = Agent::new(provider, self.model.clone())
            .with_system_prompt(self.system_prompt.clone())
            .with_max_steps(self.max_steps)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        agent.add_tool(SearchTechnicalDocTool);
        agent
    }

    /// Runs one question through a fresh agent according to [`OutputMode`].
    pub async fn answer(
        &self,
        provider: Box<dyn LlmProvider>,
        prompt: &str,
    ) -> Result<AgentOutput, AgentError> {
        let mut agent = self.agent(provider);
        match self.output {
            OutputMode::Structured => agent.run_structured(prompt).await,
            OutputMode::Text => {
                let answer = agent.run(prompt).await?;
                Ok(AgentOutput {
                    answer,
                    used_tools: !agent.tools_used().is_empty(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: Settings,
    }

    #[test]
    fn clap_defaults_match_default_impl() {
        let parsed = TestCli::parse_from(["research-agent"]).settings;
        let default = Settings::default();
        assert_eq!(parsed.host, default.host);
        assert_eq!(parsed.port, default.port);
        assert_eq!(parsed.model, default.model);
        assert_eq!(parsed.base_url, default.base_url);
        assert_eq!(parsed.max_steps, default.max_steps);
        assert_eq!(parsed.max_tokens, default.max_tokens);
        assert_eq!(parsed.output, OutputMode::Structured);
        assert_eq!(parsed.session_ttl_minutes, default.session_ttl_minutes);
    }

    #[test]
    fn session_ttl_has_a_floor() {
        let settings = Settings { session_ttl_minutes: 0, ..Settings::default() };
        assert_eq!(settings.session_ttl(), Duration::from_secs(60));
        assert_eq!(Settings::default().session_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn flags_override_defaults() {
        let parsed = TestCli::parse_from([
            "research-agent",
            "--port",
            "9000",
            "--output",
            "text",
            "--model",
            "llama-3.1-8b-instant",
        ])
        .settings;
        assert_eq!(parsed.port, 9000);
        assert_eq!(parsed.output, OutputMode::Text);
        assert_eq!(parsed.model, "llama-3.1-8b-instant");
        assert_eq!(parsed.addr(), "127.0.0.1:9000");
    }

    #[test]
    fn agent_has_lookup_tool() {
        use crate::Tool;

        struct Never;

        #[async_trait::async_trait]
        impl LlmProvider for Never {
            fn provider_name(&self) -> &str { "Never" }

            async fn complete(
                &self,
                _messages: &[crate::Message],
                _tools: &[&dyn crate::Tool],
                _model: &str,
                _options: &crate::CompletionOptions,
            ) -> Result<crate::Completion, AgentError> {
                Err(AgentError::ProviderError("unused".into()))
            }
        }

        let settings = Settings { max_steps: 3, ..Settings::default() };
        let agent = settings.agent(Box::new(Never));
        assert_eq!(agent.max_steps, 3);
        assert_eq!(agent.tools.len(), 1);
        assert_eq!(agent.tools[0].name(), "search_technical_doc");
    }
}
