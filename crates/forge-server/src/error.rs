use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use forge_core::ForgeError;

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<ForgeError>() {
            Some(ForgeError::NotInitialized) => StatusCode::CONFLICT,
            Some(ForgeError::UnknownAgent(_)) | Some(ForgeError::TaskNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Some(ForgeError::PathEscape(_)) | Some(ForgeError::InvalidAgentName(_)) => {
                StatusCode::BAD_REQUEST
            }
            // Unrecoverable model output is an upstream failure.
            Some(ForgeError::Protocol { .. }) | Some(ForgeError::NoMetaCandidates) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::warn!(status = %status, error = %self.0, "request failed");
        (
            status,
            axum::Json(serde_json::json!({ "error": format!("{:#}", self.0) })),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}
