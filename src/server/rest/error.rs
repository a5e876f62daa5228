use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::error;
use utoipa::ToSchema;

use crate::operator::VpsError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Vps(#[from] VpsError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Option<HashMap<String, serde_json::Value>>) {
        let retryable = |retryable: bool| {
            Some(HashMap::from([(
                "retryable".to_string(),
                serde_json::Value::Bool(retryable),
            )]))
        };

        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            ApiError::Vps(err) => match err {
                VpsError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", None),
                VpsError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
                VpsError::PortConflict { .. } => {
                    (StatusCode::CONFLICT, "PORT_CONFLICT", retryable(true))
                }
                VpsError::PortsExhausted { .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, "PORTS_EXHAUSTED", None)
                }
                VpsError::Runtime { .. } | VpsError::Inspection { .. } => {
                    (StatusCode::BAD_GATEWAY, "RUNTIME_ERROR", None)
                }
                VpsError::NonAtomicEdit { pre_image, .. } => {
                    let details = serde_json::to_value(pre_image.as_ref())
                        .ok()
                        .map(|previous| HashMap::from([("previous".to_string(), previous)]));
                    (StatusCode::INTERNAL_SERVER_ERROR, "EDIT_STATE_LOST", details)
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, details) = self.parts();
        if status.is_server_error() {
            error!(code, "{}", self);
        }

        let error_response = ErrorResponse {
            error: ErrorDetails {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
