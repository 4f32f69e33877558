//! WebSocket push channel
//!
//! Clients can submit commands over the socket (same semantics as
//! `POST /send`) and receive server-initiated notifications. Messages are
//! JSON envelopes of the form `{"event": ..., "data": ...}`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use motorlink_core::gateway::Gateway;
use motorlink_core::protocol::GatewayError;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::api::{AppState, SendRequest};
use crate::error::status_for;

/// Events a client may send
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientEvent {
    Send(serde_json::Value),
}

/// Outcome of a pushed command, shaped like the HTTP reply plus its status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAck {
    pub status: u16,
    pub message: String,
}

impl PushAck {
    fn from_result(result: Result<(), GatewayError>) -> Self {
        match result {
            Ok(()) => Self {
                status: StatusCode::OK.as_u16(),
                message: "Success".to_string(),
            },
            Err(e) => Self {
                status: status_for(&e).as_u16(),
                message: e.to_string(),
            },
        }
    }
}

/// Events the server sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    Send(PushAck),
    Notification(String),
    Error(PushAck),
}

/// Handle one text message from a client
pub async fn dispatch(gateway: &Gateway, text: &str) -> ServerEvent {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::Send(data)) => {
            let result = match serde_json::from_value::<SendRequest>(data) {
                Ok(request) => request.submit(gateway).await,
                Err(_) => Err(GatewayError::InvalidInput),
            };
            ServerEvent::Send(PushAck::from_result(result))
        }
        Err(e) => {
            debug!("unrecognised push message: {}", e);
            ServerEvent::Error(PushAck {
                status: StatusCode::BAD_REQUEST.as_u16(),
                message: "Unknown event".to_string(),
            })
        }
    }
}

/// Browsers always send Origin; non-browser clients may omit it
fn origin_allowed(headers: &HeaderMap, allowed: &HeaderValue) -> bool {
    headers
        .get(header::ORIGIN)
        .map_or(true, |origin| origin == allowed)
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    if !origin_allowed(&headers, &state.allowed_origin) {
        warn!("rejected socket from origin {:?}", headers.get(header::ORIGIN));
        return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("failed to encode push event: {}", e);
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("Socket: client connected");
    let mut notifications = state.notifier.subscribe();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        debug!("socket error: {}", e);
                        break;
                    }
                    None => break,
                };
                match message {
                    Message::Text(text) => {
                        let reply = dispatch(&state.gateway, text.as_str()).await;
                        if !send_event(&mut socket, &reply).await {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            note = notifications.recv() => {
                match note {
                    Ok(text) => {
                        if !send_event(&mut socket, &ServerEvent::Notification(text)).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("socket lagged, {} notification(s) dropped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!("Socket: client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_check() {
        let allowed = HeaderValue::from_static("http://localhost:3000");
        let mut headers = HeaderMap::new();
        assert!(origin_allowed(&headers, &allowed));

        headers.insert(header::ORIGIN, allowed.clone());
        assert!(origin_allowed(&headers, &allowed));

        headers.insert(header::ORIGIN, HeaderValue::from_static("http://evil.example"));
        assert!(!origin_allowed(&headers, &allowed));
    }

    #[test]
    fn test_event_envelopes() {
        let event = ServerEvent::Notification("hello".into());
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"event": "notification", "data": "hello"})
        );

        let parsed: ClientEvent =
            serde_json::from_str(r#"{"event":"send","data":{"command":1,"motor":0,"value":3}}"#)
                .unwrap();
        assert!(matches!(parsed, ClientEvent::Send(_)));
    }
}
