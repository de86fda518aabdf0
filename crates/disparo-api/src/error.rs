//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; `DispatchError`
//! converts into `HttpAppError` and renders consistently (status, body,
//! logging). Per-attachment failures are carried in `details` so the caller
//! can show which file failed and why.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use disparo_core::DispatchError;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether retrying the submission could succeed
    pub recoverable: bool,
}

/// Wrapper type for DispatchError to implement IntoResponse
/// (orphan rules: IntoResponse is external, DispatchError lives in
/// disparo-core).
#[derive(Debug)]
pub struct HttpAppError(pub DispatchError);

impl From<DispatchError> for HttpAppError {
    fn from(err: DispatchError) -> Self {
        HttpAppError(err)
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match &err {
            DispatchError::Validation { .. } => StatusCode::BAD_REQUEST,
            DispatchError::Upload { .. } => StatusCode::BAD_GATEWAY,
            DispatchError::Configuration(_)
            | DispatchError::Audience(_)
            | DispatchError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "Request failed");
        } else {
            tracing::warn!(code = err.code(), error = %err, "Request rejected");
        }

        let details = match &err {
            DispatchError::Upload { failures } => serde_json::to_value(failures).ok(),
            DispatchError::Validation { failures, .. } if !failures.is_empty() => {
                serde_json::to_value(failures).ok()
            }
            _ => None,
        };

        let body = ErrorResponse {
            error: err.to_string(),
            details,
            code: err.code().to_string(),
            recoverable: err.is_recoverable(),
        };

        (status, Json(body)).into_response()
    }
}
