//! Mapping of gateway errors onto HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use motorlink_core::protocol::GatewayError;

use crate::api::MessageResponse;

/// A gateway error on its way to an API client
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        status_for(&self.0)
    }
}

/// HTTP status for a gateway error
///
/// Everything the board or the request can cause is a 400, matching what
/// existing clients expect; only a missing device is reported as 503.
pub fn status_for(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::NotConnected | GatewayError::DeviceNotFound => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_caller_error() {
            tracing::info!("request rejected: {}", self.0);
        } else {
            tracing::warn!("request failed: {}", self.0);
        }
        (status, Json(MessageResponse::new(self.0.to_string()))).into_response()
    }
}
