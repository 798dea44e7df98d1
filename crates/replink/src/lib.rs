//! Supervised serial driver for RepStrap extruder controller boards.
//!
//! replink turns the unreliable half-duplex serial link to the controller
//! into a reliable, framed, checksummed request/response channel and runs a
//! supervised polling loop over it.
//!
//! # Crate Structure
//!
//! - [`transport`] — Serial link ownership and byte-level I/O
//! - [`frame`] — Packet codec, CRC-8 framer, and packet port
//! - [`driver`] — Command pipeline, register mapping, session supervisor

/// Re-export transport types.
pub mod transport {
    pub use replink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use replink_frame::*;
}

/// Re-export driver types.
pub mod driver {
    pub use replink_driver::*;
}
