use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use replink_driver::{Registers, Supervisor, SupervisorConfig};
use replink_transport::SerialConfig;
use tracing::info;

use crate::cmd::RunArgs;
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: RunArgs) -> CliResult<i32> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::Relaxed);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("failed to install signal handler: {err}")))?;

    let config = SupervisorConfig {
        serial: SerialConfig {
            path: args.device.clone(),
            baud_rate: args.baud,
        },
        ..SupervisorConfig::default()
    };

    info!(device = ?args.device, baud = args.baud, "starting supervised driver");

    let registers = Registers::shared();
    let mut supervisor = Supervisor::new(config, registers, stop);
    supervisor.run();

    info!("driver stopped");
    Ok(SUCCESS)
}
