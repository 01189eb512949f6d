//! API request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::ProposedCall;
use crate::tools::ToolOutput;

/// Request body of `POST /agent/tool-chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolChatRequest {
    /// Model name; empty uses the configured default
    #[serde(default)]
    pub model: String,

    /// Sampling temperature; missing or non-finite uses the configured default
    #[serde(default)]
    pub temperature: Option<f64>,

    /// The user's message
    pub prompt: String,

    /// Accepted for compatibility; responses are never streamed
    #[serde(default)]
    pub stream: bool,

    /// Partition key of the conversation history
    #[serde(default = "default_conversation_id")]
    pub conversation_id: String,
}

fn default_conversation_id() -> String {
    "default".to_string()
}

/// Envelope of every `/agent` response.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Tool calls proposed by the first model call.
#[derive(Debug, Clone, Serialize)]
pub struct FirstCall {
    pub tool_calls: Vec<ProposedCall>,
}

/// Result of one tool-chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ToolChatData {
    pub first_call: FirstCall,

    /// Result of the first tool call; `null` when no tool was called
    pub tool_result: Option<ToolOutput>,

    /// Results of every tool call, in call order
    pub tool_results: Vec<ToolOutput>,

    pub final_answer: String,
}

/// Conversation history as seen by `GET /agent/history/:id`.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryData {
    pub conversation_id: String,
    pub entries: Vec<String>,
    pub last_action: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvictData {
    pub evicted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub tools: usize,
    pub conversations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<&'static str>,
}
