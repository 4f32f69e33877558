//! # motorlink Core Library
//!
//! Core functionality for the motorlink serial gateway.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - The motor board's binary serial protocol (command and status frames)
//! - Serial port discovery with indefinite retry
//! - A background poller separating status frames from console text
//! - A bounded console log and a latest-status register
//! - Transport-independent gateway operations (send, status, console, receive)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use motorlink_core::prelude::*;
//!
//! let ctx = Arc::new(GatewayContext::default());
//! tokio::spawn(ConnectionManager::new(SystemPorts, SerialSettings::default(), ctx.clone()).run());
//! Poller::new(ctx.clone()).spawn();
//!
//! let gateway = Gateway::new(ctx);
//! gateway.send(2, 0, 1500).await?;
//! let status = gateway.get_status().await?;
//! println!("X angle: {}", status.x_angle);
//! ```

pub mod connection;
pub mod console;
pub mod gateway;
pub mod poller;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::connection::{ConnectionManager, PortProvider, SerialSettings, SystemPorts};
    pub use crate::console::{ConsoleEntry, ConsoleLog};
    pub use crate::gateway::{Gateway, GatewayContext, GatewayTiming, StatusReport};
    pub use crate::poller::{PollOutcome, Poller};
    pub use crate::protocol::{
        decode_status, encode_command, CommandFrame, GatewayError, MockChannel, StatusFrame,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
