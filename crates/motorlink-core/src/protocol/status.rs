//! Status frame decoding and read-unit classification
//!
//! Status frame format (big-endian):
//! - 1 byte: Start byte (0xFF when sent by the board)
//! - 4 bytes: Control mode (signed)
//! - 6 x 4 bytes: X angle, Y angle, X velocity, Y velocity,
//!   desired X angle, desired Y angle (IEEE-754 single precision)
//! - N bytes: Optional trailing UTF-8 message
//!
//! There is no checksum; a frame is trusted once it is long enough.

use byteorder::{BigEndian, ByteOrder};

use super::{GatewayError, Result, STATUS_FRAME_LEN, STATUS_START_BYTE};

/// Decoded telemetry from the motor board
#[derive(Debug, Clone, PartialEq)]
pub struct StatusFrame {
    /// First byte; 0xFF on frames read from the board
    pub start_byte: u8,
    /// Active control mode as reported by the firmware
    pub control_mode: i32,
    /// X axis angle in degrees
    pub x_angle: f32,
    /// Y axis angle in degrees
    pub y_angle: f32,
    /// X axis angular speed
    pub x_speed: f32,
    /// Y axis angular speed
    pub y_speed: f32,
    /// X axis set point in degrees
    pub x_desired_angle: f32,
    /// Y axis set point in degrees
    pub y_desired_angle: f32,
    /// Text trailing the structured part, if any
    pub message: Option<String>,
}

impl StatusFrame {
    /// Encode the frame as the board would send it (without the line delimiter)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; STATUS_FRAME_LEN];
        bytes[0] = self.start_byte;
        BigEndian::write_i32(&mut bytes[1..5], self.control_mode);
        let floats = [
            self.x_angle,
            self.y_angle,
            self.x_speed,
            self.y_speed,
            self.x_desired_angle,
            self.y_desired_angle,
        ];
        BigEndian::write_f32_into(&floats, &mut bytes[5..STATUS_FRAME_LEN]);
        if let Some(message) = &self.message {
            bytes.extend_from_slice(message.as_bytes());
        }
        bytes
    }
}

/// Unpack a raw status frame
///
/// The leading byte is not checked here; telling status frames from text
/// lines is [`classify`]'s job.
pub fn decode_status(data: &[u8]) -> Result<StatusFrame> {
    if data.len() < STATUS_FRAME_LEN {
        return Err(GatewayError::TooShort { len: data.len() });
    }

    let mut floats = [0f32; 6];
    BigEndian::read_f32_into(&data[5..STATUS_FRAME_LEN], &mut floats);

    let trailing = String::from_utf8_lossy(&data[STATUS_FRAME_LEN..]);
    let trailing = trailing.trim_end();
    let message = (!trailing.is_empty()).then(|| trailing.to_string());

    Ok(StatusFrame {
        start_byte: data[0],
        control_mode: BigEndian::read_i32(&data[1..5]),
        x_angle: floats[0],
        y_angle: floats[1],
        x_speed: floats[2],
        y_speed: floats[3],
        x_desired_angle: floats[4],
        y_desired_angle: floats[5],
        message,
    })
}

/// One unit read from the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw status frame, kept undecoded
    Status(Vec<u8>),
    /// Console text with trailing whitespace removed
    Text(String),
}

/// Classify a read unit as a status frame or a console line
pub fn classify(raw: Vec<u8>) -> Result<Frame> {
    if raw.first() == Some(&STATUS_START_BYTE) {
        return Ok(Frame::Status(raw));
    }
    let text = String::from_utf8(raw).map_err(|e| GatewayError::Decode(e.to_string()))?;
    Ok(Frame::Text(text.trim_end().to_string()))
}
