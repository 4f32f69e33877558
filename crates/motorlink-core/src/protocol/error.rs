//! Gateway errors

use thiserror::Error;

/// Result alias used throughout the gateway
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur while talking to the motor board
///
/// The `Display` text of the caller-facing variants is the message returned
/// to API clients, so keep it stable.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Opening or configuring a port failed
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Read or buffer-control failure on an open handle
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A command frame could not be written
    #[error("Serial write failed: {0}")]
    WriteFailed(std::io::Error),

    /// No enumerated port matches the configured description
    #[error("UART target device not found")]
    DeviceNotFound,

    /// Discovery has not installed a handle yet
    #[error("Device not connected")]
    NotConnected,

    /// Command value does not fit in a signed 32-bit integer
    #[error("Value out of range for 4-byte representation")]
    ValueOutOfRange {
        /// The rejected value
        value: i128,
    },

    /// Encoded frame has the wrong length
    #[error("Packed data doesn't match expected buffer size")]
    PackingError {
        /// Frame length the protocol requires
        expected: usize,
        /// Length actually produced
        actual: usize,
    },

    /// Stored status frame is shorter than the structured part
    #[error("Status is too short")]
    TooShort {
        /// Length of the stored frame
        len: usize,
    },

    /// The status register is still empty
    #[error("No status received")]
    NoStatusReceived,

    /// Request fields are missing or not integers
    #[error("Please enter valid integers for command, motor, and value.")]
    InvalidInput,

    /// Board output is neither a status frame nor UTF-8 text
    #[error("Decode error: {0}")]
    Decode(String),

    /// Malformed command frame
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

impl GatewayError {
    /// True for errors caused by the request itself rather than the device
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            GatewayError::ValueOutOfRange { .. }
                | GatewayError::PackingError { .. }
                | GatewayError::InvalidInput
                | GatewayError::TooShort { .. }
                | GatewayError::NoStatusReceived
        )
    }
}
