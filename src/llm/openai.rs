//! OpenAI-compatible `/chat/completions` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ChatRequest, ChatResponse, LlmClient, LlmError, ToolCall};

/// Client for any provider exposing the OpenAI chat-completion API
/// (DashScope compatible mode, OpenAI, OpenRouter, vLLM, ...).
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| LlmError::Client(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Build the JSON body for one request.
fn request_body(request: &ChatRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": request.messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "stream": false,
    });
    if !request.tools.is_empty() {
        body["tools"] = json!(request.tools);
        body["tool_choice"] = json!("auto");
    }
    body
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = request_body(&request);

        let resp = self.client.post(self.endpoint()).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let parsed: CompletionResponse = resp.json().await?;
        parsed.into_chat_response()
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl CompletionResponse {
    fn into_chat_response(self) -> Result<ChatResponse, LlmError> {
        let model = self.model;
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices".to_string()))?;

        // Some providers omit ids on tool calls; the second phase needs them
        // to pair tool messages with calls.
        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|mut tc| {
                if tc.id.trim().is_empty() {
                    tc.id = format!("call_{}", uuid::Uuid::new_v4().simple());
                }
                tc
            })
            .collect();

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls,
            model,
            finish_reason: choice.finish_reason,
        })
    }
}

/// Normalize a user-supplied base URL.
///
/// A pasted full endpoint loses its `/chat/completions` suffix, and `/v1` is
/// appended only when the URL has no path at all.
pub fn normalize_base_url(base_url: &str) -> String {
    let base = base_url.trim();
    if base.is_empty() {
        return crate::config::DEFAULT_BASE_URL.to_string();
    }

    let trimmed = base.trim_end_matches('/');
    let base = trimmed
        .strip_suffix("/chat/completions")
        .unwrap_or(trimmed)
        .trim_end_matches('/');

    match url::Url::parse(base) {
        Ok(url) if url.path().is_empty() || url.path() == "/" => format!("{}/v1", base),
        _ => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, ToolSchema};

    #[test]
    fn normalize_base_url_variants() {
        assert_eq!(normalize_base_url("https://api.openai.com"), "https://api.openai.com/v1");
        assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com/v1");
        assert_eq!(
            normalize_base_url("https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions"),
            "https://dashscope.aliyuncs.com/compatible-mode/v1"
        );
        assert_eq!(normalize_base_url("  "), crate::config::DEFAULT_BASE_URL);
    }

    #[test]
    fn request_body_binds_tools_only_when_present() {
        let mut request = ChatRequest {
            model: "qwen-max".to_string(),
            messages: vec![ChatMessage::user("打开@道路图层")],
            tools: Vec::new(),
            temperature: 0.2,
            max_tokens: 512,
        };
        let body = request_body(&request);
        assert!(body.get("tools").is_none());
        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["messages"][0]["role"], json!("user"));

        request.tools.push(ToolSchema::function(
            "toggle_layer_visibility",
            "toggle",
            json!({"type": "object"}),
        ));
        let body = request_body(&request);
        assert_eq!(body["tools"][0]["type"], json!("function"));
        assert_eq!(body["tool_choice"], json!("auto"));
    }

    #[test]
    fn completion_response_fills_missing_tool_call_ids() {
        let parsed: CompletionResponse = serde_json::from_value(json!({
            "model": "qwen-max",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "",
                        "type": "function",
                        "function": {"name": "toggle_layer_visibility", "arguments": "{\"layer_name\":\"道路\",\"action\":\"show\"}"}
                    }]
                }
            }]
        }))
        .expect("deserialize");

        let resp = parsed.into_chat_response().expect("convert");
        assert_eq!(resp.tool_calls.len(), 1);
        assert!(resp.tool_calls[0].id.starts_with("call_"));
        assert_eq!(resp.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn completion_response_without_choices_is_invalid() {
        let parsed: CompletionResponse =
            serde_json::from_value(json!({"choices": []})).expect("deserialize");
        assert!(matches!(
            parsed.into_chat_response(),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
