//! HTTP mapping for service errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::MirrorError;

impl MirrorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MirrorError::CapacityExceeded => StatusCode::TOO_MANY_REQUESTS,
            MirrorError::UpstreamUnavailable(_) | MirrorError::UpstreamBanned => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            MirrorError::InvalidId(_) => StatusCode::BAD_REQUEST,
            MirrorError::MalformedDocument { .. } | MirrorError::StorageUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for MirrorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (
            status,
            axum::Json(serde_json::json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}
