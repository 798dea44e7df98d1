use std::io::{Read, Write};

use crate::error::Result;

/// A half-duplex byte channel to the controller board.
///
/// This is the seam between the transport and the protocol layers: the real
/// implementation wraps a serial port, tests substitute in-memory scripts.
/// Reads must only be issued when [`available`](ByteLink::available) reported
/// pending bytes, which keeps the polling loop non-blocking.
pub trait ByteLink: Read + Write {
    /// Number of received bytes waiting to be read.
    fn available(&mut self) -> Result<usize>;

    /// Discard everything in the receive buffer.
    fn discard_input(&mut self) -> Result<()>;

    /// Read exactly one pending byte.
    ///
    /// Callers check [`available`](ByteLink::available) first; the default
    /// implementation is a single-byte `read_exact`.
    fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }
}
