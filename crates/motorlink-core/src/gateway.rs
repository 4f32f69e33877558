//! Gateway context and operations
//!
//! [`GatewayContext`] owns everything the poller, the connection manager and
//! the API handlers share: the device handle, the latest status frame and
//! the console log. [`Gateway`] implements the client-facing operations on
//! top of it, independent of the transport that exposes them.

use serde::Serialize;
use std::io::Write;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::console::{ConsoleEntry, ConsoleLog};
use crate::protocol::{
    decode_status, encode_command, read_line, CommandFrame, DeviceChannel, GatewayError, Result,
    StatusFrame,
};

/// Timing knobs for discovery, polling and status queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayTiming {
    /// Delay between discovery attempts
    pub discovery_retry: Duration,
    /// Poller sleep when no input is buffered
    pub poll_idle: Duration,
    /// Poller sleep after a read or decode failure
    pub poll_error_backoff: Duration,
    /// Wait between sending a status request and reading the register
    pub status_wait: Duration,
}

impl Default for GatewayTiming {
    fn default() -> Self {
        Self {
            discovery_retry: Duration::from_secs(5),
            poll_idle: Duration::from_millis(500),
            poll_error_backoff: Duration::from_secs(5),
            status_wait: Duration::from_millis(200),
        }
    }
}

/// Most recent raw status frame; no history
#[derive(Debug, Default)]
pub struct StatusRegister {
    latest: Option<Vec<u8>>,
}

impl StatusRegister {
    /// Replace the held frame
    pub fn store(&mut self, raw: Vec<u8>) {
        self.latest = Some(raw);
    }

    /// The held frame, if any has arrived
    pub fn latest(&self) -> Option<&[u8]> {
        self.latest.as_deref()
    }
}

type DeviceSlot = Option<Box<dyn DeviceChannel>>;

/// State shared between the poller, the connection manager and API handlers
pub struct GatewayContext {
    device: StdMutex<DeviceSlot>,
    status: Mutex<StatusRegister>,
    console: Mutex<ConsoleLog>,
    timing: GatewayTiming,
}

impl GatewayContext {
    /// Empty context: no device, no status, empty console
    pub fn new(timing: GatewayTiming) -> Self {
        Self {
            device: StdMutex::new(None),
            status: Mutex::new(StatusRegister::default()),
            console: Mutex::new(ConsoleLog::default()),
            timing,
        }
    }

    /// Timing shared by discovery, the poller and status queries
    pub fn timing(&self) -> GatewayTiming {
        self.timing
    }

    fn device_slot(&self) -> MutexGuard<'_, DeviceSlot> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a freshly opened device; refused if one is already assigned
    pub fn install_device(&self, channel: Box<dyn DeviceChannel>) -> bool {
        let mut slot = self.device_slot();
        if slot.is_some() {
            warn!("device already assigned, ignoring new handle");
            return false;
        }
        *slot = Some(channel);
        true
    }

    /// Whether discovery has installed a handle
    pub fn has_device(&self) -> bool {
        self.device_slot().is_some()
    }

    /// Run blocking I/O against the device while holding the handle lock
    ///
    /// Holding the lock for the whole closure keeps one read unit or one
    /// written frame from interleaving with another task's traffic.
    pub fn with_device<T>(
        &self,
        f: impl FnOnce(&mut dyn DeviceChannel) -> std::io::Result<T>,
    ) -> Result<T> {
        let mut slot = self.device_slot();
        let channel = slot.as_mut().ok_or(GatewayError::NotConnected)?;
        Ok(f(channel.as_mut())?)
    }

    /// [`with_device`](Self::with_device) on the blocking thread pool
    pub async fn device_io<T, F>(self: &Arc<Self>, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn DeviceChannel) -> std::io::Result<T> + Send + 'static,
    {
        let ctx = Arc::clone(self);
        tokio::task::spawn_blocking(move || ctx.with_device(f))
            .await
            .map_err(|e| GatewayError::Io(std::io::Error::other(e)))?
    }

    /// Write a complete frame to the device
    pub async fn write_frame(self: &Arc<Self>, frame: Vec<u8>) -> Result<()> {
        let result = self
            .device_io(move |channel| {
                channel.write_all(&frame)?;
                channel.flush()
            })
            .await;
        match result {
            Err(GatewayError::Io(e)) => Err(GatewayError::WriteFailed(e)),
            other => other,
        }
    }

    /// Overwrite the status register
    pub async fn store_status(&self, raw: Vec<u8>) {
        self.status.lock().await.store(raw);
    }

    /// Copy of the most recent raw status frame
    pub async fn latest_status(&self) -> Option<Vec<u8>> {
        self.status.lock().await.latest().map(<[u8]>::to_vec)
    }

    /// Append an already stamped entry
    pub async fn append_console(&self, entry: ConsoleEntry) {
        self.console.lock().await.append(entry);
    }

    /// Append a line to the console log, stamped now
    pub async fn push_console(&self, text: impl Into<String>) {
        self.console.lock().await.push_line(text);
    }

    /// Console lines, oldest first
    pub async fn console_snapshot(&self) -> Vec<ConsoleEntry> {
        self.console.lock().await.snapshot()
    }
}

impl Default for GatewayContext {
    fn default() -> Self {
        Self::new(GatewayTiming::default())
    }
}

/// Status fields returned to API clients
///
/// The trailing text message is decoded but deliberately not included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// Start byte of the frame
    #[serde(rename = "startByte")]
    pub start_byte: u8,
    /// Firmware control mode
    #[serde(rename = "controlMode")]
    pub control_mode: i32,
    /// X axis angle in degrees
    #[serde(rename = "DEGX")]
    pub x_angle: f32,
    /// Y axis angle in degrees
    #[serde(rename = "DEGY")]
    pub y_angle: f32,
    /// X axis angular speed
    #[serde(rename = "VELX")]
    pub x_speed: f32,
    /// Y axis angular speed
    #[serde(rename = "VELY")]
    pub y_speed: f32,
    /// X axis set point
    #[serde(rename = "DEZX")]
    pub x_desired_angle: f32,
    /// Y axis set point
    #[serde(rename = "DEZY")]
    pub y_desired_angle: f32,
}

impl From<&StatusFrame> for StatusReport {
    fn from(frame: &StatusFrame) -> Self {
        Self {
            start_byte: frame.start_byte,
            control_mode: frame.control_mode,
            x_angle: frame.x_angle,
            y_angle: frame.y_angle,
            x_speed: frame.x_speed,
            y_speed: frame.y_speed,
            x_desired_angle: frame.x_desired_angle,
            y_desired_angle: frame.y_desired_angle,
        }
    }
}

/// Client-facing gateway operations
#[derive(Clone)]
pub struct Gateway {
    ctx: Arc<GatewayContext>,
}

impl Gateway {
    /// Operations over a shared context
    pub fn new(ctx: Arc<GatewayContext>) -> Self {
        Self { ctx }
    }

    /// The shared context behind these operations
    pub fn context(&self) -> &Arc<GatewayContext> {
        &self.ctx
    }

    /// Encode a command and write it to the board
    pub async fn send(&self, command: u8, motor: u8, value: i64) -> Result<()> {
        let frame = encode_command(command, motor, value)?;
        debug!(command, motor, value, "sending command");
        self.ctx.write_frame(frame).await
    }

    /// Request a status frame and report what the poller stored
    ///
    /// The wait is a fixed delay, so a slow board yields the previous frame
    /// (or none at all).
    pub async fn get_status(&self) -> Result<StatusReport> {
        self.ctx
            .write_frame(CommandFrame::status_request().to_bytes())
            .await?;
        tokio::time::sleep(self.ctx.timing().status_wait).await;

        let raw = self
            .ctx
            .latest_status()
            .await
            .ok_or(GatewayError::NoStatusReceived)?;
        let frame = decode_status(&raw)?;
        if let Some(message) = &frame.message {
            debug!("status message: {}", message);
        }
        Ok(StatusReport::from(&frame))
    }

    /// Recent console lines, oldest first
    pub async fn get_console(&self) -> Vec<ConsoleEntry> {
        self.ctx.console_snapshot().await
    }

    /// Read one line straight from the device, bypassing the poller
    ///
    /// Competes with the poller for the same bytes; whichever reads first
    /// gets the line.
    pub async fn receive_once(&self) -> Result<Option<String>> {
        let raw = self
            .ctx
            .device_io(|channel| {
                if channel.bytes_to_read()? > 0 {
                    read_line(channel).map(Some)
                } else {
                    Ok(None)
                }
            })
            .await?;

        match raw {
            Some(raw) => {
                let text =
                    String::from_utf8(raw).map_err(|e| GatewayError::Decode(e.to_string()))?;
                info!("received line directly: {}", text.trim_end());
                Ok(Some(text.trim_end().to_string()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MockChannel;

    #[tokio::test]
    async fn test_send_without_device() {
        let gateway = Gateway::new(Arc::new(GatewayContext::default()));
        assert!(matches!(
            gateway.send(1, 0, 5).await,
            Err(GatewayError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_install_only_once() {
        let ctx = GatewayContext::default();
        assert!(ctx.install_device(Box::new(MockChannel::new())));
        assert!(!ctx.install_device(Box::new(MockChannel::new())));
        assert!(ctx.has_device());
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let ctx = Arc::new(GatewayContext::default());
        let mock = MockChannel::new();
        mock.set_fail_writes(true);
        ctx.install_device(Box::new(mock));

        let gateway = Gateway::new(ctx);
        assert!(matches!(
            gateway.send(1, 0, 5).await,
            Err(GatewayError::WriteFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_receive_once() {
        let ctx = Arc::new(GatewayContext::default());
        let mock = MockChannel::new();
        ctx.install_device(Box::new(mock.clone()));
        let gateway = Gateway::new(ctx);

        assert_eq!(gateway.receive_once().await.unwrap(), None);
        mock.inject_read(b"limit switch hit\r\n");
        assert_eq!(
            gateway.receive_once().await.unwrap().as_deref(),
            Some("limit switch hit")
        );
    }

    #[test]
    fn test_status_report_keys() {
        let report = StatusReport {
            start_byte: 0xFF,
            control_mode: 1,
            x_angle: 1.0,
            y_angle: 2.0,
            x_speed: 3.0,
            y_speed: 4.0,
            x_desired_angle: 5.0,
            y_desired_angle: 6.0,
        };
        let json = serde_json::to_value(&report).unwrap();
        for key in [
            "startByte",
            "controlMode",
            "DEGX",
            "DEGY",
            "VELX",
            "VELY",
            "DEZX",
            "DEZY",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
