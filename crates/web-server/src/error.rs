use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use engine::EngineError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Engine(err) => match err {
                EngineError::Validation(_) | EngineError::InvalidAmount(_) => {
                    StatusCode::BAD_REQUEST
                }
                EngineError::NoMarket { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                EngineError::InvalidState { .. }
                | EngineError::AwaitingDeposit(_)
                | EngineError::DuplicateOrder(_)
                | EngineError::DuplicateDepositAddress { .. }
                | EngineError::Core(_) => StatusCode::CONFLICT,
                EngineError::Gateway(_) | EngineError::ExecutionFailed { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            },
        }
    }
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed upstream.");
        } else {
            tracing::debug!(error = %self, %status, "Request rejected.");
        }

        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}
