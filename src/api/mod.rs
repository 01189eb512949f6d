//! HTTP API for the map agent.
//!
//! ## Endpoints
//!
//! - `POST /agent/tool-chat` - Answer one user message with tool calls
//! - `GET /agent/history/:conversation_id` - Inspect a conversation's history
//! - `DELETE /agent/history/:conversation_id` - Drop a conversation's history
//! - `GET /health` - Health check
//! - `GET /` - Service info

mod error;
mod routes;
pub mod types;

use std::sync::Arc;

use tracing::info;

pub use error::ApiError;
pub use routes::{router, AppState};

use crate::agent::ToolChatAgent;
use crate::config::Config;
use crate::history::InMemoryHistoryStore;
use crate::llm::OpenAiCompatibleClient;
use crate::tools::ToolRegistry;

/// Build the agent from `config` and serve until the process stops.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let llm = Arc::new(OpenAiCompatibleClient::new(
        &config.api_key,
        &config.base_url,
        config.llm_timeout,
    )?);
    let tools = Arc::new(ToolRegistry::new());
    let history = InMemoryHistoryStore::new(&config.history);
    history.spawn_sweeper(config.history.sweep_interval);

    info!(
        tools = tools.len(),
        max_conversations = config.history.max_conversations,
        "Agent ready"
    );
    let agent = ToolChatAgent::new(llm, tools, history, config.max_tokens);

    let addr = format!("{}:{}", config.host, config.port);
    let app = router(Arc::new(AppState { config, agent }));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
