use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;

pub mod probe;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the supervised driver loop against the controller board.
    Run(RunArgs),
    /// Probe the serial link: reset the bus, time round-trips, and print
    /// the firmware's self-test readback.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args),
        Command::Probe(args) => probe::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Serial device path.
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub device: PathBuf,
    /// Baud rate (the stock firmware runs at 38400).
    #[arg(long, default_value_t = 38_400)]
    pub baud: u32,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Serial device path.
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub device: PathBuf,
    /// Baud rate.
    #[arg(long, default_value_t = 38_400)]
    pub baud: u32,
    /// Seconds to wait for the port and firmware to settle after opening.
    #[arg(long, default_value_t = 5)]
    pub settle_secs: u64,
    /// Number of timed round-trips.
    #[arg(long, default_value_t = 10)]
    pub iterations: u32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}
