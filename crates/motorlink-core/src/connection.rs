//! Connection management
//!
//! Finds the motor board among the serial ports, opens it and hands the
//! handle to the shared [`GatewayContext`]. A missing board is normal: the
//! manager keeps looking at a fixed interval until one shows up.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::gateway::GatewayContext;
use crate::protocol::{
    clear_buffers, configure_port, list_ports, open_port, DeviceChannel, GatewayError, PortInfo,
    Result, SerialChannel, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS,
};

/// Description fragment identifying the board's USB bridge
pub const DEFAULT_DEVICE_MATCH: &str = "STLink";

/// Console line recorded on every failed discovery attempt
pub const NOT_FOUND_MESSAGE: &str =
    "UART target device not found. Please connect the device and try again.";

/// How to find and open the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Substring looked for in each port's description
    pub device_match: String,
    /// Explicit port name; skips description matching when set
    pub port: Option<String>,
    /// Line speed
    pub baud_rate: u32,
    /// Per-read timeout on the opened port
    pub read_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            device_match: DEFAULT_DEVICE_MATCH.to_string(),
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

impl SerialSettings {
    /// Whether `port` is the board we are looking for
    pub fn matches(&self, port: &PortInfo) -> bool {
        match &self.port {
            Some(name) => port.name == *name,
            None => port.description().contains(&self.device_match),
        }
    }
}

/// Source of serial ports
pub trait PortProvider: Send + Sync {
    /// Enumerate ports in discovery order
    fn list_ports(&self) -> Vec<PortInfo>;

    /// Open `port`, ready for traffic
    fn open(&self, port: &PortInfo, settings: &SerialSettings) -> Result<Box<dyn DeviceChannel>>;
}

/// The host's real serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortProvider for SystemPorts {
    fn list_ports(&self) -> Vec<PortInfo> {
        list_ports()
    }

    fn open(&self, port: &PortInfo, settings: &SerialSettings) -> Result<Box<dyn DeviceChannel>> {
        let mut serial = open_port(&port.name, settings.baud_rate, settings.read_timeout)?;
        configure_port(serial.as_mut())?;
        clear_buffers(serial.as_mut())?;
        Ok(Box::new(SerialChannel::new(serial)))
    }
}

/// Discovers the board and installs it into the gateway context
pub struct ConnectionManager<P: PortProvider = SystemPorts> {
    provider: Arc<P>,
    settings: SerialSettings,
    ctx: Arc<GatewayContext>,
}

impl<P: PortProvider + 'static> ConnectionManager<P> {
    /// Create a manager that installs into `ctx`
    pub fn new(provider: P, settings: SerialSettings, ctx: Arc<GatewayContext>) -> Self {
        Self {
            provider: Arc::new(provider),
            settings,
            ctx,
        }
    }

    /// Settings used to match and open the board
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    /// First port matching the settings, if any
    pub fn find_target(&self) -> Option<PortInfo> {
        find_target(self.provider.as_ref(), &self.settings)
    }

    /// Single discovery attempt, blocking the calling thread
    pub fn try_connect(&self) -> Result<(PortInfo, Box<dyn DeviceChannel>)> {
        try_connect(self.provider.as_ref(), &self.settings)
    }

    /// Single discovery attempt on the blocking thread pool
    pub async fn connect_once(&self) -> Result<(PortInfo, Box<dyn DeviceChannel>)> {
        let provider = Arc::clone(&self.provider);
        let settings = self.settings.clone();
        tokio::task::spawn_blocking(move || try_connect(provider.as_ref(), &settings))
            .await
            .map_err(|e| GatewayError::Io(std::io::Error::other(e)))?
    }

    /// Look for the board until it is found
    ///
    /// Every failed attempt is logged and noted on the console, then retried
    /// after the fixed discovery interval. Never gives up.
    pub async fn discover(&self) -> (PortInfo, Box<dyn DeviceChannel>) {
        let retry = self.ctx.timing().discovery_retry;
        loop {
            match self.connect_once().await {
                Ok((port, channel)) => {
                    let notice = format!("Device found at port {}", port.name);
                    info!("{} ({})", notice, port.description());
                    self.ctx.push_console(notice).await;
                    return (port, channel);
                }
                Err(GatewayError::DeviceNotFound) => {
                    warn!("{}", NOT_FOUND_MESSAGE);
                    self.ctx.push_console(NOT_FOUND_MESSAGE).await;
                }
                Err(e) => {
                    warn!("failed to open device: {}", e);
                    self.ctx.push_console(format!("Failed to open device: {}", e)).await;
                }
            }
            tokio::time::sleep(retry).await;
        }
    }

    /// Discover the board and hand it to the gateway context
    pub async fn run(self) {
        let (port, channel) = self.discover().await;
        if self.ctx.install_device(channel) {
            info!("serial gateway attached to {}", port.name);
        }
    }
}

fn find_target<P: PortProvider>(provider: &P, settings: &SerialSettings) -> Option<PortInfo> {
    provider
        .list_ports()
        .into_iter()
        .find(|port| settings.matches(port))
}

fn try_connect<P: PortProvider>(
    provider: &P,
    settings: &SerialSettings,
) -> Result<(PortInfo, Box<dyn DeviceChannel>)> {
    let port = find_target(provider, settings).ok_or(GatewayError::DeviceNotFound)?;
    let mut channel = provider.open(&port, settings)?;
    channel.clear_input_buffer()?;
    channel.clear_output_buffer()?;
    Ok((port, channel))
}
