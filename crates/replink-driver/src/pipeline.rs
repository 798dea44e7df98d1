use std::collections::VecDeque;

use replink_frame::{Packet, PacketPort, ResultCode};
use replink_transport::ByteLink;
use tracing::{trace, warn};

use crate::error::{DriverError, Result};

/// Maximum number of outstanding handlers before the session is declared
/// stuck. Exceeding this is a bus-health signal, not a recoverable state.
pub const PENDING_CEILING: usize = 20;

/// FIFO correlation of sent commands with their replies.
///
/// The link is half-duplex and the device answers exactly once per command,
/// in send order, so one handler is pushed per packet transmitted and the
/// oldest handler is popped per packet received. `H` is plain data (the
/// driver uses an enum of readback kinds); the pipeline never interprets it.
#[derive(Debug)]
pub struct Pipeline<L, H> {
    port: PacketPort<L>,
    pending: VecDeque<H>,
}

impl<L: ByteLink, H> Pipeline<L, H> {
    pub fn new(port: PacketPort<L>) -> Self {
        Self {
            port,
            pending: VecDeque::new(),
        }
    }

    /// Transmit `packet` and queue `handler` for its reply.
    ///
    /// Fails with [`DriverError::QueueOverflow`] once more than
    /// [`PENDING_CEILING`] handlers are outstanding.
    pub fn send_and_enqueue(&mut self, packet: &Packet, handler: H) -> Result<()> {
        self.port.send(packet)?;
        self.pending.push_back(handler);
        trace!(pending = self.pending.len(), "command enqueued");

        if self.pending.len() > PENDING_CEILING {
            warn!(
                pending = self.pending.len(),
                "pending queue overflow; bus is not making progress"
            );
            return Err(DriverError::QueueOverflow(self.pending.len()));
        }
        Ok(())
    }

    /// Attempt one await-response cycle.
    ///
    /// Returns the oldest handler with its clean reply, `None` when nothing
    /// is outstanding or no frame completed yet, and a fault for any packet
    /// delivered with a non-Ok result.
    pub fn drive_once(&mut self) -> Result<Option<(H, Packet)>> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let Some(packet) = self.port.readback()? else {
            return Ok(None);
        };

        if packet.result != ResultCode::Ok {
            return Err(DriverError::Protocol(packet.result));
        }

        // Non-empty was checked above; the queue only shrinks here.
        let handler = self
            .pending
            .pop_front()
            .ok_or(DriverError::Protocol(ResultCode::GenericError))?;
        Ok(Some((handler, packet)))
    }

    /// Number of handlers awaiting replies.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop all outstanding handlers (fault recovery).
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Borrow the underlying packet port.
    pub fn port_mut(&mut self) -> &mut PacketPort<L> {
        &mut self.port
    }
}
