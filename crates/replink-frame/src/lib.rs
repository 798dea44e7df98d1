//! Wire protocol for the extruder controller: packet codec, CRC-8
//! byte-stream framer, and the packet-level port over a byte link.
//!
//! Wire format (all integers little-endian):
//!
//! ```text
//! ┌────────────┬────────────┬────────────────────┬──────────┐
//! │ Start 0xD5 │ Length (1B)│ Content            │ CRC-8    │
//! │            │            │ addr, cmd, params  │ poly 0x8C│
//! └────────────┴────────────┴────────────────────┴──────────┘
//! ```
//!
//! The framer turns the unreliable byte stream into [`Packet`] values with a
//! delivery [`ResultCode`]: clean frames, checksum failures, and
//! timeout-forced `NoResponse` completions all surface the same way, so a
//! solicited read never blocks indefinitely.

pub mod error;
pub mod framer;
pub mod packet;
pub mod port;

pub use error::{FrameError, Result};
pub use framer::{Framer, FramerState, PACKET_TIMEOUT};
pub use packet::{
    crc8_update, encode_packet, Packet, ResultCode, CRC8_POLY, FRAME_OVERHEAD, MAX_CONTENT,
    START_BYTE,
};
pub use port::{PacketPort, RESET_FILLER, RESET_FILLER_LEN, RESET_SETTLE};
