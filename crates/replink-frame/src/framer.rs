use std::time::{Duration, Instant};

use tracing::trace;

use crate::packet::{Packet, ResultCode, START_BYTE};

/// How long a started frame may take to complete before it is force-resolved
/// as [`ResultCode::NoResponse`].
pub const PACKET_TIMEOUT: Duration = Duration::from_millis(100);

/// Decoder position within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    /// Scanning for the start byte; everything else is discarded.
    AwaitStart,
    /// Next byte is the content length.
    AwaitLength,
    /// Collecting content bytes.
    AwaitContent { remaining: usize },
    /// Next byte is the frame checksum.
    AwaitCrc,
}

/// Byte-at-a-time frame decoder with timeout-forced completion.
///
/// One framer lives for the duration of a transport session. Each completed
/// or timed-out frame is moved out as an owned [`Packet`] and the state
/// returns to [`FramerState::AwaitStart`]; the packet under construction is
/// never aliased with a delivered one.
#[derive(Debug)]
pub struct Framer {
    state: FramerState,
    deadline: Option<Instant>,
    timeout: Duration,
    building: Option<Packet>,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    /// Framer with the protocol's 100ms packet timeout.
    pub fn new() -> Self {
        Self::with_timeout(PACKET_TIMEOUT)
    }

    /// Framer with an explicit packet timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            state: FramerState::AwaitStart,
            deadline: None,
            timeout,
            building: None,
        }
    }

    /// Current decoder state.
    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Whether the framer is between frames.
    pub fn is_idle(&self) -> bool {
        self.state == FramerState::AwaitStart
    }

    /// Arm the response deadline if none is pending.
    ///
    /// Used by the "await response" driving mode so a solicited read is
    /// guaranteed to resolve within the timeout window even if the device
    /// never sends the start byte.
    pub fn arm_deadline(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.timeout);
        }
    }

    /// Feed one received byte; returns a completed packet if this byte
    /// finished a frame.
    pub fn push(&mut self, byte: u8) -> Option<Packet> {
        match self.state {
            FramerState::AwaitStart => {
                if byte == START_BYTE {
                    self.deadline = Some(Instant::now() + self.timeout);
                    self.building = Some(Packet::new());
                    self.state = FramerState::AwaitLength;
                }
            }
            FramerState::AwaitLength => {
                self.state = FramerState::AwaitContent {
                    remaining: byte as usize,
                };
            }
            FramerState::AwaitContent { remaining } => {
                if let Some(packet) = self.building.as_mut() {
                    // A fresh packet always has room for the advertised
                    // length (<= 255), so this cannot refuse in practice.
                    if packet.push_u8(byte).is_err() {
                        packet.result = ResultCode::BufferOverflow;
                    }
                }
                self.state = FramerState::AwaitContent {
                    remaining: remaining - 1,
                };
            }
            FramerState::AwaitCrc => {
                let mut packet = self.building.take().unwrap_or_default();
                if byte != packet.crc() {
                    trace!(
                        expected = packet.crc(),
                        received = byte,
                        "frame checksum mismatch"
                    );
                    packet.result = ResultCode::CrcMismatch;
                }
                packet.extract_tag();
                self.deadline = None;
                self.state = FramerState::AwaitStart;
                return Some(packet);
            }
        }

        // A zero-length frame (or the last content byte) falls through to
        // the CRC stage on the same pass.
        if let FramerState::AwaitContent { remaining: 0 } = self.state {
            self.state = FramerState::AwaitCrc;
        }

        None
    }

    /// Force-resolve the pending read if its deadline has passed.
    ///
    /// Produces exactly one [`ResultCode::NoResponse`] packet per armed
    /// deadline, reusing a partially-built packet when one exists, and
    /// resets the state machine.
    pub fn check_timeout(&mut self, now: Instant) -> Option<Packet> {
        let deadline = self.deadline?;
        if now <= deadline {
            return None;
        }

        trace!("packet timeout expired before frame completed");
        let mut packet = self.building.take().unwrap_or_default();
        packet.result = ResultCode::NoResponse;
        self.deadline = None;
        self.state = FramerState::AwaitStart;
        Some(packet)
    }
}
