//! Agent module - answers one tool-chat request.
//!
//! Each request is a fixed two-phase turn rather than an open loop:
//! 1. Build the system prompt from the tool catalog and the conversation history
//! 2. Call the LLM with every tool bound; a plain answer ends the turn
//! 3. Execute every proposed tool call in order and record the results
//! 4. Call the LLM again with the results to phrase the final answer

mod orchestrator;
mod prompt;

pub use orchestrator::{AgentError, ChatTurn, ProposedCall, ToolChatAgent, TurnRequest};
pub use prompt::{render_history, Phase, PromptAssembler};

#[cfg(test)]
pub(crate) use orchestrator::testing;
