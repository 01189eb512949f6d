//! Mapping of request failures to HTTP responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use super::types::ApiResponse;
use crate::agent::AgentError;
use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Body(#[from] JsonRejection),

    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Body(rejection) => rejection.status(),
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Agent(AgentError::Provider(e)) => match e {
                LlmError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                LlmError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
                LlmError::Request(_) | LlmError::Status { .. } | LlmError::InvalidResponse(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Body(rejection) => rejection.body_text(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(status = %status, "Request failed: {}", message);
        } else {
            tracing::debug!(status = %status, "Request rejected: {}", message);
        }
        (status, Json(ApiResponse::<()>::failure(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(e: LlmError) -> ApiError {
        ApiError::Agent(AgentError::Provider(e))
    }

    #[test]
    fn provider_errors_map_to_gateway_statuses() {
        assert_eq!(provider(LlmError::Timeout).status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            provider(LlmError::Status {
                status: 401,
                body: "bad key".to_string()
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            provider(LlmError::InvalidResponse("no choices".to_string())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            provider(LlmError::Request("connection refused".to_string())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            provider(LlmError::Client("bad header".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_request_is_bad_request() {
        let err = ApiError::InvalidRequest("prompt must not be empty".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "prompt must not be empty");
    }
}
