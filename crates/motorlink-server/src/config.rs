//! Server configuration
//!
//! Loaded from a JSON file; every field has a default so a partial (or
//! missing) file is fine.

use axum::http::HeaderValue;
use motorlink_core::connection::{SerialSettings, DEFAULT_DEVICE_MATCH};
use motorlink_core::gateway::GatewayTiming;
use motorlink_core::protocol::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address the HTTP/WebSocket server listens on
    pub bind_address: String,
    /// The single origin allowed to call the API from a browser
    pub allowed_origin: String,
    /// Text broadcast by the notify endpoint
    pub notification_message: String,
    pub serial: SerialConfig,
    pub timing: TimingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".to_string(),
            allowed_origin: "http://localhost:3000".to_string(),
            notification_message: "Your notification message here.".to_string(),
            serial: SerialConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Substring of the port description identifying the board
    pub device_match: String,
    /// Explicit port, bypassing description matching
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device_match: DEFAULT_DEVICE_MATCH.to_string(),
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub discovery_retry_ms: u64,
    pub poll_idle_ms: u64,
    pub poll_error_backoff_ms: u64,
    pub status_wait_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let timing = GatewayTiming::default();
        Self {
            discovery_retry_ms: timing.discovery_retry.as_millis() as u64,
            poll_idle_ms: timing.poll_idle.as_millis() as u64,
            poll_error_backoff_ms: timing.poll_error_backoff.as_millis() as u64,
            status_wait_ms: timing.status_wait.as_millis() as u64,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Check values that would only fail later, at bind or open time
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid(format!("bind_address '{}': {}", self.bind_address, e)))?;
        self.origin_header()?;
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be non-zero".into()));
        }
        if self.serial.port.is_none() && self.serial.device_match.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "device_match must not be empty when no port is given".into(),
            ));
        }
        Ok(())
    }

    /// The allowed origin as a header value
    pub fn origin_header(&self) -> Result<HeaderValue, ConfigError> {
        HeaderValue::from_str(&self.allowed_origin).map_err(|e| {
            ConfigError::Invalid(format!("allowed_origin '{}': {}", self.allowed_origin, e))
        })
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            device_match: self.serial.device_match.clone(),
            port: self.serial.port.clone(),
            baud_rate: self.serial.baud_rate,
            read_timeout: Duration::from_millis(self.serial.read_timeout_ms),
        }
    }

    pub fn timing(&self) -> GatewayTiming {
        GatewayTiming {
            discovery_retry: Duration::from_millis(self.timing.discovery_retry_ms),
            poll_idle: Duration::from_millis(self.timing.poll_idle_ms),
            poll_error_backoff: Duration::from_millis(self.timing.poll_error_backoff_ms),
            status_wait: Duration::from_millis(self.timing.status_wait_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.timing(), GatewayTiming::default());
        assert_eq!(config.serial_settings(), SerialSettings::default());
    }

    #[test]
    fn test_zero_baud_rejected() {
        let mut config = GatewayConfig::default();
        config.serial.baud_rate = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_match_needs_port() {
        let mut config = GatewayConfig::default();
        config.serial.device_match = String::new();
        assert!(config.validate().is_err());
        config.serial.port = Some("/dev/ttyACM0".into());
        assert!(config.validate().is_ok());
    }
}
