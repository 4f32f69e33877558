//! Command frame encoding/decoding
//!
//! Command frame format (all fields big-endian):
//! - 1 byte: Command
//! - 1 byte: Motor index
//! - 4 bytes: Value (signed)
//! - 2 bytes: Terminator, always 0xFFFF

use byteorder::{BigEndian, ByteOrder};

use super::{GatewayError, Result, COMMAND_FRAME_LEN, FRAME_TERMINATOR};

/// Command number that asks the board for a status frame
const STATUS_REQUEST_COMMAND: u8 = 1;

/// A single command for the motor board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    /// Command number
    pub command: u8,
    /// Motor the command applies to
    pub motor: u8,
    /// Command argument
    pub value: i32,
}

impl CommandFrame {
    /// Create a command frame, checking that `value` fits in 4 bytes
    pub fn new(command: u8, motor: u8, value: i64) -> Result<Self> {
        let value = i32::try_from(value).map_err(|_| GatewayError::ValueOutOfRange {
            value: value.into(),
        })?;
        Ok(Self {
            command,
            motor,
            value,
        })
    }

    /// The fixed frame that requests a status report
    pub fn status_request() -> Self {
        Self {
            command: STATUS_REQUEST_COMMAND,
            motor: 0,
            value: 0,
        }
    }

    /// Whether this frame is a status request
    pub fn is_status_request(&self) -> bool {
        self.command == STATUS_REQUEST_COMMAND
    }

    /// Encode the frame to raw bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(COMMAND_FRAME_LEN);
        bytes.push(self.command);
        bytes.push(self.motor);

        let mut value_bytes = [0u8; 4];
        BigEndian::write_i32(&mut value_bytes, self.value);
        bytes.extend_from_slice(&value_bytes);

        let mut terminator = [0u8; 2];
        BigEndian::write_u16(&mut terminator, FRAME_TERMINATOR);
        bytes.extend_from_slice(&terminator);

        bytes
    }

    /// Decode a frame from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != COMMAND_FRAME_LEN {
            return Err(GatewayError::InvalidFrame(format!(
                "command frame must be {} bytes, got {}",
                COMMAND_FRAME_LEN,
                data.len()
            )));
        }

        let terminator = BigEndian::read_u16(&data[6..8]);
        if terminator != FRAME_TERMINATOR {
            return Err(GatewayError::InvalidFrame(format!(
                "bad terminator {:#06x}",
                terminator
            )));
        }

        Ok(Self {
            command: data[0],
            motor: data[1],
            value: BigEndian::read_i32(&data[2..6]),
        })
    }
}

/// Pack a command into its wire representation
///
/// Fails with [`GatewayError::ValueOutOfRange`] when `value` does not fit in
/// a signed 32-bit integer, and with [`GatewayError::PackingError`] if the
/// encoded frame is not exactly [`COMMAND_FRAME_LEN`] bytes.
pub fn encode_command(command: u8, motor: u8, value: i64) -> Result<Vec<u8>> {
    let bytes = CommandFrame::new(command, motor, value)?.to_bytes();
    if bytes.len() != COMMAND_FRAME_LEN {
        return Err(GatewayError::PackingError {
            expected: COMMAND_FRAME_LEN,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}
