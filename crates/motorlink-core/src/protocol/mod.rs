//! Serial Protocol Communication
//!
//! Implements the motor board's binary serial protocol.
//!
//! Outgoing traffic is a fixed 8-byte command frame. Incoming traffic is a
//! stream of newline-terminated units: a unit whose first byte is
//! [`STATUS_START_BYTE`] is a binary status frame, anything else is a line of
//! console text.

pub mod channel;
mod error;
mod frame;
pub mod serial;
mod status;

pub use channel::{read_line, DeviceChannel, MockChannel, SerialChannel};
pub use error::{GatewayError, Result};
pub use frame::{encode_command, CommandFrame};
pub use serial::{clear_buffers, configure_port, list_ports, open_port, PortInfo};
pub use status::{classify, decode_status, Frame, StatusFrame};

/// Default baud rate for the motor board UART
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default serial read timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// Encoded size of a command frame
pub const COMMAND_FRAME_LEN: usize = 8;

/// Terminator closing every command frame
pub const FRAME_TERMINATOR: u16 = 0xFFFF;

/// First byte of a binary status frame
pub const STATUS_START_BYTE: u8 = 0xFF;

/// Size of the structured part of a status frame
pub const STATUS_FRAME_LEN: usize = 29;

/// Upper bound on a single read unit; a line longer than this is cut
pub const MAX_FRAME_SIZE: usize = 8192;
