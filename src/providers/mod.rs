pub mod groq;

use crate::{AgentError, Completion, CompletionOptions, Message, Tool, ToolCall};
use serde_json::{json, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Shared OpenAI-compatible helpers
// (Groq serves the same chat-completions shape)
// ─────────────────────────────────────────────────────────────────────────────

pub fn build_openai_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut obj = json!({
                "role": m.role.to_string(),
                "content": m.content,
            });
            if let Some(id) = &m.tool_call_id {
                obj["tool_call_id"] = json!(id);
            }
            if let Some(tc) = &m.tool_calls {
                if !tc.is_null() {
                    obj["tool_calls"] = tc.clone();
                }
            }
            obj
        })
        .collect()
}

pub fn build_openai_tools(tools: &[&dyn Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.parameters_schema(),
                }
            })
        })
        .collect()
}

pub fn build_request_body(
    model: &str,
    messages: &[Message],
    tools: &[&dyn Tool],
    options: &CompletionOptions,
) -> Value {
    let mut body = json!({
        "model": model,
        "messages": build_openai_messages(messages),
        "temperature": options.temperature,
        "max_tokens": options.max_tokens,
    });

    let tools_json = build_openai_tools(tools);
    if !tools_json.is_empty() {
        body["tools"] = json!(tools_json);
        body["tool_choice"] = json!("auto");
    }
    body
}

pub fn parse_openai_completion(json: &Value) -> Result<Completion, AgentError> {
    let choice = json
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| AgentError::InvalidResponse("missing 'choices'".into()))?;

    let message = choice
        .get("message")
        .ok_or_else(|| AgentError::InvalidResponse("missing 'message'".into()))?;

    let content = message.get("content").and_then(|v| v.as_str()).map(str::to_string);
    let raw_tool_calls = message
        .get("tool_calls")
        .filter(|v| !v.is_null())
        .cloned();

    let mut tool_calls: Vec<ToolCall> = vec![];
    if let Some(calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
        for call in calls {
            let id = call.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string();
            let function = call.get("function").ok_or_else(|| {
                AgentError::InvalidResponse("missing function in tool call".into())
            })?;
            let name =
                function.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
            let args_raw = function
                .get("arguments")
                .ok_or_else(|| AgentError::InvalidResponse("missing arguments".into()))?;
            let args: Value = match args_raw.as_str() {
                Some("") => json!({}),
                Some(s) => serde_json::from_str(s)
                    .map_err(|e| AgentError::InvalidResponse(format!("bad args JSON: {e}")))?,
                None => args_raw.clone(),
            };
            tool_calls.push(ToolCall { id, name, args });
        }
    }

    Ok(Completion { content, tool_calls, raw_tool_calls })
}
