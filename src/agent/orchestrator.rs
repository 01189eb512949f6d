//! Two-phase tool-call turn.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::history::InMemoryHistoryStore;
use crate::llm::{
    ChatMessage, ChatRequest, ChatResponse, LlmClient, LlmError, ToolCall, ToolSchema,
};
use crate::tools::{ToolOutput, ToolRegistry};

use super::prompt::{Phase, PromptAssembler};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] LlmError),
}

/// One user message to answer.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub conversation_id: String,
    pub prompt: String,
    pub model: String,
    pub temperature: f64,
}

/// A tool call as proposed by the model, with decoded arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposedCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

impl From<&ToolCall> for ProposedCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            name: call.function.name.clone(),
            args: call.parsed_arguments(),
        }
    }
}

/// Outcome of a turn. Not persisted; only the history entries outlive it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub tool_calls: Vec<ProposedCall>,
    /// One result per proposed call, in order. Failed dispatches appear as
    /// their error message.
    pub tool_results: Vec<ToolOutput>,
    pub final_answer: String,
}

/// Answers tool-chat requests: one model call to pick tools, dispatch, and
/// one model call to phrase the answer.
pub struct ToolChatAgent {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    schemas: Vec<ToolSchema>,
    prompts: PromptAssembler,
    history: InMemoryHistoryStore,
    max_tokens: u32,
}

impl ToolChatAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        history: InMemoryHistoryStore,
        max_tokens: u32,
    ) -> Self {
        let schemas = tools.get_tool_schemas();
        let prompts = PromptAssembler::new(&tools);
        Self {
            llm,
            tools,
            schemas,
            prompts,
            history,
            max_tokens,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn history(&self) -> &InMemoryHistoryStore {
        &self.history
    }

    /// Run one turn. The conversation stays locked until the turn ends, so
    /// concurrent turns on one conversation see each other's history.
    pub async fn run_turn(&self, request: TurnRequest) -> Result<ChatTurn, AgentError> {
        let mut conversation = self.history.lock(&request.conversation_id).await;

        tracing::info!(
            conversation_id = %request.conversation_id,
            model = %request.model,
            history_len = conversation.entries().len(),
            "Starting tool-chat turn"
        );

        let user = ChatMessage::user(request.prompt.as_str());
        let first_system = self
            .prompts
            .build_system_prompt(conversation.entries(), Phase::First);
        let first = self
            .complete(&request, vec![ChatMessage::system(first_system), user.clone()])
            .await?;
        tracing::debug!(
            tool_calls = first.tool_calls.len(),
            finish_reason = ?first.finish_reason,
            "First completion received"
        );

        if first.tool_calls.is_empty() {
            return Ok(ChatTurn {
                tool_calls: Vec::new(),
                tool_results: Vec::new(),
                final_answer: first.content.unwrap_or_default(),
            });
        }

        let proposed: Vec<ProposedCall> = first.tool_calls.iter().map(ProposedCall::from).collect();
        let mut results = Vec::with_capacity(proposed.len());
        let mut tool_messages = Vec::with_capacity(proposed.len());

        for call in &proposed {
            let output = match self.tools.dispatch(&call.name, &call.args, conversation.context()) {
                Ok(output) => {
                    tracing::debug!(tool = %call.name, entry = %output.history_entry(), "Tool executed");
                    conversation.record(&output);
                    output
                }
                Err(e) => {
                    tracing::warn!(tool = %call.name, args = %call.args, "Tool dispatch failed: {}", e);
                    ToolOutput::Text(e.to_string())
                }
            };
            tool_messages.push(ChatMessage::tool_result(call.id.as_str(), output.to_string()));
            results.push(output);
        }

        let second_system = self
            .prompts
            .build_system_prompt(conversation.entries(), Phase::Second);
        let mut messages = vec![
            ChatMessage::system(second_system),
            user,
            ChatMessage::assistant_tool_calls(first.content, first.tool_calls),
        ];
        messages.extend(tool_messages);

        let second = self.complete(&request, messages).await?;
        tracing::debug!(finish_reason = ?second.finish_reason, "Second completion received");

        Ok(ChatTurn {
            tool_calls: proposed,
            tool_results: results,
            final_answer: second.content.unwrap_or_default(),
        })
    }

    async fn complete(
        &self,
        request: &TurnRequest,
        messages: Vec<ChatMessage>,
    ) -> Result<ChatResponse, LlmError> {
        self.llm
            .chat_completion(ChatRequest {
                model: request.model.clone(),
                messages,
                tools: self.schemas.clone(),
                temperature: request.temperature,
                max_tokens: self.max_tokens,
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::llm::{ChatRequest, ChatResponse, LlmClient, LlmError, ToolCall};

    /// Replays canned responses and records every request it receives.
    #[derive(Default)]
    pub struct ScriptedLlm {
        responses: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedLlm {
        pub fn new(responses: Vec<Result<ChatResponse, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    pub fn text(content: &str) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            content: Some(content.to_string()),
            finish_reason: Some("stop".to_string()),
            ..Default::default()
        })
    }

    pub fn calls(calls: Vec<ToolCall>) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            content: None,
            tool_calls: calls,
            finish_reason: Some("tool_calls".to_string()),
            ..Default::default()
        })
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
            self.requests.lock().expect("requests lock").push(request);
            self.responses
                .lock()
                .expect("responses lock")
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".to_string())))
        }
    }
}
