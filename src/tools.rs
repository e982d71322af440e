//! The one local tool the agent can call: a static technical glossary.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{AgentError, Tool};

pub const UNKNOWN_TOPIC: &str = "Topic not listed in the local documentation.";

const KNOWLEDGE_BASE: &[(&str, &str)] = &[
    (
        "rag",
        "RAG (Retrieval-Augmented Generation) injects external data into an LLM's context at query time.",
    ),
    (
        "pydantic-ai",
        "A framework for building typed agents, more robust than LangChain.",
    ),
    (
        "vllm",
        "A high-performance LLM serving engine used in production.",
    ),
];

/// Case-insensitive lookup; unknown topics get [`UNKNOWN_TOPIC`].
pub fn lookup(topic: &str) -> &'static str {
    let key = topic.trim().to_lowercase();
    KNOWLEDGE_BASE
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .unwrap_or(UNKNOWN_TOPIC)
}

pub fn topics() -> impl Iterator<Item = &'static str> {
    KNOWLEDGE_BASE.iter().map(|(k, _)| *k)
}

pub struct SearchTechnicalDocTool;

#[async_trait]
impl Tool for SearchTechnicalDocTool {
    fn name(&self) -> &'static str {
        "search_technical_doc"
    }

    fn description(&self) -> &'static str {
        "Searches the internal technical knowledge base for a topic keyword"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "Topic keyword, e.g. \"rag\", \"vllm\", \"pydantic-ai\""
                }
            },
            "required": ["topic"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> Result<String, AgentError> {
        let topic = args["topic"]
            .as_str()
            .ok_or_else(|| AgentError::ToolError("Missing 'topic'".into()))?;

        Ok(lookup(topic).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        assert_eq!(lookup("  VLLM "), lookup("vllm"));
        assert_ne!(lookup("vllm"), UNKNOWN_TOPIC);
    }

    #[test]
    fn lookup_unknown_falls_back() {
        assert_eq!(lookup("kubernetes"), UNKNOWN_TOPIC);
        assert_eq!(lookup(""), UNKNOWN_TOPIC);
    }

    #[test]
    fn three_topics_plus_fallback() {
        let topics: Vec<_> = topics().collect();
        assert_eq!(topics, ["rag", "pydantic-ai", "vllm"]);
        assert_eq!(lookup("groq"), UNKNOWN_TOPIC);
    }
}
