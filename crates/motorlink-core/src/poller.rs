//! Background poller
//!
//! Reads the board's output one line at a time for the life of the process.
//! Status frames go to the status register, everything else to the console
//! log. Failures are logged and followed by a back-off; the poller never
//! reopens the device itself.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::gateway::GatewayContext;
use crate::protocol::{classify, read_line, Frame, GatewayError, Result};

/// What a single poll produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing buffered, or no device yet
    Idle,
    /// The read timed out without data
    Empty,
    /// A status frame of the given length was stored
    Status(usize),
    /// A console line was recorded
    Line(String),
}

/// Reads board output into the status register and console log
pub struct Poller {
    ctx: Arc<GatewayContext>,
}

impl Poller {
    /// Poller over a shared context
    pub fn new(ctx: Arc<GatewayContext>) -> Self {
        Self { ctx }
    }

    /// Start polling on a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Poll forever
    pub async fn run(self) {
        let timing = self.ctx.timing();
        loop {
            match self.poll_once().await {
                Ok(PollOutcome::Idle) => tokio::time::sleep(timing.poll_idle).await,
                Ok(_) => {}
                Err(e) => {
                    error!("Error occurred: {}. Will retry shortly...", e);
                    tokio::time::sleep(timing.poll_error_backoff).await;
                }
            }
        }
    }

    /// Read and handle at most one unit from the device
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let read = self
            .ctx
            .device_io(|channel| {
                if channel.bytes_to_read()? > 0 {
                    read_line(channel).map(Some)
                } else {
                    Ok(None)
                }
            })
            .await;

        let raw = match read {
            Ok(Some(raw)) => raw,
            Ok(None) | Err(GatewayError::NotConnected) => return Ok(PollOutcome::Idle),
            Err(e) => return Err(e),
        };
        if raw.is_empty() {
            return Ok(PollOutcome::Empty);
        }

        match classify(raw)? {
            Frame::Status(raw) => {
                let len = raw.len();
                debug!("status frame ({} bytes)", len);
                self.ctx.store_status(raw).await;
                Ok(PollOutcome::Status(len))
            }
            Frame::Text(line) => {
                debug!("console: {}", line);
                self.ctx.push_console(line.clone()).await;
                Ok(PollOutcome::Line(line))
            }
        }
    }
}
