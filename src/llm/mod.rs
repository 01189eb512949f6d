//! Chat-completion client abstraction.
//!
//! The orchestrator only needs "send a message list, get back a message with
//! optional tool calls", so the trait is a single method. The production
//! implementation speaks the OpenAI-compatible wire format.

mod openai;

pub use openai::{normalize_base_url, OpenAiCompatibleClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while talking to the model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Failed to build provider client: {0}")]
    Client(String),

    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_decode() {
            LlmError::InvalidResponse(e.to_string())
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in a chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant turn that proposed `tool_calls`, replayed in the second phase.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool invocation proposed by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the provider sent them.
    #[serde(default)]
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: &Value) -> Self {
        Self {
            id: id.into(),
            kind: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.to_string(),
            },
        }
    }

    /// Decode the argument string.
    ///
    /// Blank arguments decode to an empty object; undecodable text is kept
    /// as a JSON string so the tool reports it as an argument error.
    pub fn parsed_arguments(&self) -> Value {
        let raw = self.function.arguments.trim();
        if raw.is_empty() {
            return Value::Object(serde_json::Map::new());
        }
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    }
}

fn function_type() -> String {
    "function".to_string()
}

/// Tool declaration sent with a request (`{"type":"function","function":{...}}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: function_type(),
            function: FunctionSchema {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// A single chat-completion call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Tools bound to this call; empty means no `tools` field is sent.
    pub tools: Vec<ToolSchema>,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// The first choice of a chat-completion response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parsed_arguments_handles_blank_and_garbage() {
        let mut call = ToolCall::new("c1", "toggle_layer_visibility", &json!({"layer_name": "道路"}));
        assert_eq!(call.parsed_arguments(), json!({"layer_name": "道路"}));

        call.function.arguments = "   ".to_string();
        assert_eq!(call.parsed_arguments(), json!({}));

        call.function.arguments = "layer=道路".to_string();
        assert_eq!(call.parsed_arguments(), json!("layer=道路"));
    }

    #[test]
    fn tool_message_serializes_with_call_id() {
        let msg = ChatMessage::tool_result("call_1", "show:道路图层");
        let value = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(
            value,
            json!({"role": "tool", "content": "show:道路图层", "tool_call_id": "call_1"})
        );
    }

    #[test]
    fn tool_call_deserializes_without_type() {
        let call: ToolCall = serde_json::from_value(json!({
            "id": "c9",
            "function": {"name": "execute_erase_analysis", "arguments": "{}"}
        }))
        .expect("deserialize");
        assert_eq!(call.kind, "function");
        assert_eq!(call.function.name, "execute_erase_analysis");
    }
}
