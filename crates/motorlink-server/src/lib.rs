//! # motorlink Server
//!
//! HTTP and WebSocket front end for the motorlink serial gateway.
//!
//! Routes:
//! - `POST /send` submit a command frame
//! - `GET /status` request and return the board's status
//! - `GET /console` recent console lines
//! - `GET /receive` read one line directly from the board
//! - `GET /notify` broadcast a notification to socket clients
//! - `GET /ws` push channel

pub mod api;
pub mod config;
pub mod error;
pub mod push;

pub use api::{build_router, AppState};
pub use config::{ConfigError, GatewayConfig};
