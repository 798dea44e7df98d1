//! Supervised control driver for the extruder controller board.
//!
//! Builds on [`replink_frame`] and [`replink_transport`]: a FIFO command
//! [`Pipeline`] correlates pipelined replies with their handlers, the
//! [`ExtruderMap`] translates between the typed [`Registers`] bank and wire
//! commands, and the [`Supervisor`] runs sessions in an infinite
//! connect / run / fault / retry loop with fail-safe semantics.

pub mod error;
pub mod extruder;
pub mod pipeline;
pub mod registers;
pub mod supervisor;

pub use error::{DriverError, Result};
pub use extruder::{ExtruderMap, Readback};
pub use pipeline::{Pipeline, PENDING_CEILING};
pub use registers::{lock_registers, MotorTuning, RegisterHandle, Registers};
pub use supervisor::{Supervisor, SupervisorConfig};
