//! Device channels
//!
//! [`DeviceChannel`] abstracts the byte pipe to the motor board so the poller
//! and the gateway can run against a real UART or an in-memory stub.

use serialport::SerialPort;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

use super::MAX_FRAME_SIZE;

/// Abstraction for the link to the motor board
pub trait DeviceChannel: Read + Write + Send {
    /// Get number of bytes available to read
    fn bytes_to_read(&mut self) -> io::Result<u32>;

    /// Clear input buffers
    fn clear_input_buffer(&mut self) -> io::Result<()>;

    /// Clear output buffers
    fn clear_output_buffer(&mut self) -> io::Result<()>;
}

/// Read one newline-terminated unit
///
/// Returns whatever arrived before the read timeout if no newline shows up,
/// possibly nothing. The newline is kept.
pub fn read_line(channel: &mut dyn DeviceChannel) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        if line.len() >= MAX_FRAME_SIZE {
            warn!("no newline within {} bytes, splitting line", MAX_FRAME_SIZE);
            break;
        }
        match channel.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                line.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(line)
}

/// Serial port wrapper implementing DeviceChannel
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Wrap an opened port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    /// Name of the underlying port, if known
    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl DeviceChannel for SerialChannel {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port.bytes_to_read().map_err(io::Error::other)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }

    fn clear_output_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Output)
            .map_err(io::Error::other)
    }
}

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

/// In-memory stand-in for the motor board
///
/// Clones share the same buffers, so a test can keep one handle while the
/// gateway owns another. An optional responder sees every write and may
/// queue a reply, which lets a test play the board's side of a request.
#[derive(Clone, Default)]
pub struct MockChannel {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Default)]
struct MockInner {
    read_buffer: VecDeque<u8>,
    written: Vec<u8>,
    fail_reads: bool,
    fail_writes: bool,
    responder: Option<Responder>,
}

impl MockChannel {
    /// Create an empty mock channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock channel whose responder is called on every write
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        let mock = Self::new();
        mock.lock().responder = Some(Box::new(responder));
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes for the gateway to read
    pub fn inject_read(&self, data: &[u8]) {
        self.lock().read_buffer.extend(data);
    }

    /// Everything written so far
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Bytes still waiting to be read
    pub fn pending(&self) -> usize {
        self.lock().read_buffer.len()
    }

    /// Make reads fail, as if the device had been unplugged
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Make writes fail, as if the device had been unplugged
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }
}

fn unplugged() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected")
}

impl Read for MockChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.lock();
        if inner.fail_reads {
            return Err(unplugged());
        }
        if inner.read_buffer.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        }
        let count = inner.read_buffer.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(inner.read_buffer.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

impl Write for MockChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(unplugged());
        }
        inner.written.extend_from_slice(buf);
        let reply = inner.responder.as_mut().and_then(|respond| respond(buf));
        if let Some(reply) = reply {
            inner.read_buffer.extend(reply);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DeviceChannel for MockChannel {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        let inner = self.lock();
        if inner.fail_reads {
            return Err(unplugged());
        }
        Ok(inner.read_buffer.len() as u32)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.lock().read_buffer.clear();
        Ok(())
    }

    fn clear_output_buffer(&mut self) -> io::Result<()> {
        Ok(())
    }
}
