//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::types::{
    ApiResponse, EvictData, FirstCall, HealthResponse, HistoryData, ServiceInfo, ToolChatData,
    ToolChatRequest,
};
use crate::agent::{ToolChatAgent, TurnRequest};
use crate::config::Config;

const SERVICE_NAME: &str = "map-agent";

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub agent: ToolChatAgent,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/agent/tool-chat", post(tool_chat))
        .route(
            "/agent/history/:conversation_id",
            get(get_history).delete(delete_history),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);
    if config.cors_allows_any() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Service info.
async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        description: "LLM tool-calling agent for map layer operations and spatial analysis",
        endpoints: vec![
            "POST /agent/tool-chat",
            "GET /agent/history/:conversation_id",
            "DELETE /agent/history/:conversation_id",
            "GET /health",
        ],
    })
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        tools: state.agent.tools().len(),
        conversations: state.agent.history().len().await,
    })
}

/// Answer one user message: pick tools, run them, phrase the reply.
async fn tool_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ToolChatRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ToolChatData>>, ApiError> {
    let Json(req) = payload?;
    if req.prompt.trim().is_empty() {
        return Err(ApiError::InvalidRequest("prompt must not be empty".to_string()));
    }

    let model = match req.model.trim() {
        "" => state.config.default_model.clone(),
        model => model.to_string(),
    };
    let temperature = req
        .temperature
        .filter(|t| t.is_finite())
        .unwrap_or(state.config.default_temperature);

    let turn = state
        .agent
        .run_turn(TurnRequest {
            conversation_id: req.conversation_id,
            prompt: req.prompt,
            model,
            temperature,
        })
        .await?;

    Ok(Json(ApiResponse::ok(ToolChatData {
        first_call: FirstCall {
            tool_calls: turn.tool_calls,
        },
        tool_result: turn.tool_results.first().cloned(),
        tool_results: turn.tool_results,
        final_answer: turn.final_answer,
    })))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Json<ApiResponse<HistoryData>> {
    let snapshot = state.agent.history().snapshot(&conversation_id).await;
    let data = match snapshot {
        Some(conversation) => HistoryData {
            last_action: conversation.last_entry().map(str::to_string),
            updated_at: conversation.updated_at(),
            entries: conversation.entries().to_vec(),
            conversation_id,
        },
        None => HistoryData {
            conversation_id,
            entries: Vec::new(),
            last_action: None,
            updated_at: None,
        },
    };
    Json(ApiResponse::ok(data))
}

async fn delete_history(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Json<ApiResponse<EvictData>> {
    let evicted = state.agent.history().evict(&conversation_id).await;
    tracing::info!(conversation_id = %conversation_id, evicted, "History eviction requested");
    Json(ApiResponse::ok(EvictData { evicted }))
}
