//! HTTP routes
//!
//! Thin request/response wrappers around [`Gateway`]; the JSON shapes here
//! are what browser clients consume.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use motorlink_core::console::ConsoleEntry;
use motorlink_core::gateway::{Gateway, StatusReport};
use motorlink_core::protocol::GatewayError;
use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::push;

/// Capacity of the notification broadcast channel
const NOTIFY_CHANNEL_CAPACITY: usize = 16;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    pub notifier: broadcast::Sender<String>,
    pub allowed_origin: HeaderValue,
    pub notification_message: Arc<str>,
}

impl AppState {
    pub fn new(gateway: Gateway, allowed_origin: HeaderValue, notification_message: &str) -> Self {
        let (notifier, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);
        Self {
            gateway,
            notifier,
            allowed_origin,
            notification_message: Arc::from(notification_message),
        }
    }
}

/// JSON integer of any width
///
/// Keeps integers past the 64-bit range so they can be reported as out of
/// range rather than as malformed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideInt(pub i128);

impl<'de> Deserialize<'de> for WideInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(WideIntVisitor)
    }
}

struct WideIntVisitor;

impl Visitor<'_> for WideIntVisitor {
    type Value = WideInt;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integer")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<WideInt, E> {
        Ok(WideInt(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<WideInt, E> {
        Ok(WideInt(v.into()))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<WideInt, E> {
        Ok(WideInt(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<WideInt, E> {
        Ok(WideInt(i128::try_from(v).unwrap_or(i128::MAX)))
    }

    // serde_json parses integer literals that overflow 64 bits as floats
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<WideInt, E> {
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        if v.fract() == 0.0 && (v >= LIMIT || v < -LIMIT) {
            Ok(WideInt(v as i128))
        } else {
            Err(E::invalid_type(Unexpected::Float(v), &self))
        }
    }
}

/// Body of a command submission
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SendRequest {
    pub command: i64,
    pub motor: i64,
    pub value: WideInt,
}

impl SendRequest {
    /// Check that command and motor fit in a byte and value in 64 bits
    pub fn into_parts(self) -> Result<(u8, u8, i64), GatewayError> {
        let command = u8::try_from(self.command).map_err(|_| GatewayError::InvalidInput)?;
        let motor = u8::try_from(self.motor).map_err(|_| GatewayError::InvalidInput)?;
        let WideInt(value) = self.value;
        let value = i64::try_from(value).map_err(|_| GatewayError::ValueOutOfRange { value })?;
        Ok((command, motor, value))
    }

    /// Validate and forward to the board
    pub async fn submit(self, gateway: &Gateway) -> Result<(), GatewayError> {
        let (command, motor, value) = self.into_parts()?;
        gateway.send(command, motor, value).await
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn success() -> Self {
        Self::new("Success")
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub message: String,
    pub data: StatusReport,
}

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Build the application router with CORS limited to the configured origin
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.allowed_origin.clone())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/send", post(send_command))
        .route("/status", get(get_status))
        .route("/console", get(get_console))
        .route("/receive", get(receive_data))
        .route("/notify", get(send_notification))
        .route("/ws", get(push::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn send_command(
    State(state): State<AppState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        debug!("bad send body: {}", e);
        GatewayError::InvalidInput
    })?;
    debug!(?request, "send");
    request.submit(&state.gateway).await?;
    Ok(Json(MessageResponse::success()))
}

async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let data = state.gateway.get_status().await?;
    Ok(Json(StatusResponse {
        message: "Success".to_string(),
        data,
    }))
}

async fn get_console(State(state): State<AppState>) -> Json<DataResponse<Vec<ConsoleEntry>>> {
    Json(DataResponse {
        data: state.gateway.get_console().await,
    })
}

async fn receive_data(
    State(state): State<AppState>,
) -> Result<Json<DataResponse<Option<String>>>, ApiError> {
    let data = state.gateway.receive_once().await?;
    Ok(Json(DataResponse { data }))
}

async fn send_notification(State(state): State<AppState>) -> &'static str {
    let receivers = state
        .notifier
        .send(state.notification_message.to_string())
        .unwrap_or(0);
    info!("notification broadcast to {} client(s)", receivers);
    "Notification sent!"
}
