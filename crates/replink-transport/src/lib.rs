//! Serial transport layer for the replink stack.
//!
//! Owns the half-duplex serial channel to the controller board and exposes
//! byte-level I/O: blocking writes, availability-driven reads, and input
//! draining for bus recovery. Everything above this crate works against the
//! [`ByteLink`] trait, so the protocol layers never touch a device directly.

pub mod error;
pub mod link;
pub mod serial;

pub use error::{Result, TransportError};
pub use link::ByteLink;
pub use serial::{SerialConfig, SerialLink, DEFAULT_BAUD_RATE, DEFAULT_DEVICE_PATH};
