use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use replink_frame::PacketPort;
use replink_transport::{ByteLink, SerialConfig, SerialLink};
use tracing::{debug, info, warn};

use crate::error::DriverError;
use crate::extruder::{self, ExtruderMap, Readback};
use crate::pipeline::Pipeline;
use crate::registers::{lock_registers, RegisterHandle};

/// Supervisor timing and transport configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Serial device to drive.
    pub serial: SerialConfig,
    /// Sleep between control-loop iterations.
    pub tick: Duration,
    /// Delay before reconnecting after a fault.
    pub retry_delay: Duration,
    /// Status poll interval.
    pub status_interval: Duration,
    /// Heater PV/SV poll interval.
    pub heater_interval: Duration,
    /// Motor PV/SV poll interval.
    pub motor_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            tick: Duration::from_millis(10),
            retry_delay: Duration::from_millis(100),
            status_interval: Duration::from_millis(50),
            heater_interval: Duration::from_millis(500),
            motor_interval: Duration::from_millis(50),
        }
    }
}

/// Outer restart state. Faults carry their typed reason so the fail-safe
/// transition is observable and testable.
#[derive(Debug)]
enum Phase {
    Connecting,
    Faulted(DriverError),
}

/// Runs one transport session at a time inside an infinite
/// connect / run / fault / retry loop.
///
/// All faults funnel into the same path: assert fail-safe registers, clear
/// the pending queue, fire a best-effort disable, drop the session, wait,
/// reconnect. Only the operator stop flag exits the loop.
pub struct Supervisor {
    config: SupervisorConfig,
    registers: RegisterHandle,
    stop: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, registers: RegisterHandle, stop: Arc<AtomicBool>) -> Self {
        Self {
            config,
            registers,
            stop,
        }
    }

    /// Drive the supervisor until the stop flag is raised.
    pub fn run(&mut self) {
        let mut phase = Phase::Connecting;
        loop {
            if self.stop.load(Ordering::Relaxed) {
                info!("stop requested; supervisor exiting");
                return;
            }
            phase = match phase {
                Phase::Connecting => match self.connect_and_drive() {
                    Ok(()) => {
                        info!("session stopped cleanly; supervisor exiting");
                        return;
                    }
                    Err(fault) => Phase::Faulted(fault),
                },
                Phase::Faulted(fault) => {
                    warn!(%fault, "session fault; retrying after delay");
                    std::thread::sleep(self.config.retry_delay);
                    Phase::Connecting
                }
            };
        }
    }

    fn connect_and_drive(&mut self) -> Result<(), DriverError> {
        let link = match SerialLink::open(&self.config.serial) {
            Ok(link) => link,
            Err(err) => {
                // Opening failed: there is no session to quiesce, but the
                // outward state must still read as fail-safe.
                lock_registers(&self.registers).fail_safe();
                return Err(err.into());
            }
        };
        self.drive_session(link)
    }

    /// Run one full session over an already-open link.
    ///
    /// Returns `Ok(())` only for an operator stop; every other exit is a
    /// fault that has already been answered with the fail-safe procedure.
    pub fn drive_session<L: ByteLink>(&mut self, link: L) -> Result<(), DriverError> {
        let mut port = PacketPort::new(link);
        if let Err(err) = port.reset() {
            lock_registers(&self.registers).fail_safe();
            return Err(err.into());
        }
        // Discard whatever straggler the reset shook loose.
        let _ = port.readback();

        let mut pipeline = Pipeline::new(port);
        let mut map = ExtruderMap::new();

        // Independent poll timers; all due immediately.
        let now = Instant::now();
        let mut status_due = now;
        let mut heater_due = now;
        let mut motor_due = now;

        info!("session running");

        loop {
            if self.stop.load(Ordering::Relaxed) {
                // Operator interrupt: best-effort disable, then exit for
                // good. The result is ignored by design.
                if let Ok(packet) = extruder::disable_command() {
                    let _ = pipeline.port_mut().send(&packet);
                    let _ = pipeline.port_mut().readback();
                }
                return Ok(());
            }

            std::thread::sleep(self.config.tick);

            if let Err(fault) = self.step(
                &mut pipeline,
                &mut map,
                &mut status_due,
                &mut heater_due,
                &mut motor_due,
            ) {
                self.enter_fail_safe(&mut pipeline);
                return Err(fault);
            }
        }
    }

    /// One control-loop tick: drain a reply, scan registers, run timers.
    fn step<L: ByteLink>(
        &mut self,
        pipeline: &mut Pipeline<L, Readback>,
        map: &mut ExtruderMap,
        status_due: &mut Instant,
        heater_due: &mut Instant,
        motor_due: &mut Instant,
    ) -> Result<(), DriverError> {
        if let Some((readback, packet)) = pipeline.drive_once()? {
            let mut regs = lock_registers(&self.registers);
            regs.connected = true;
            map.apply(readback, &packet, &mut regs);
        }

        let commands = {
            let regs = lock_registers(&self.registers);
            map.scan(&regs)?
        };
        for (packet, readback) in commands {
            pipeline.send_and_enqueue(&packet, readback)?;
        }

        let now = Instant::now();
        if now >= *status_due {
            *status_due = now + self.config.status_interval;
            pipeline.send_and_enqueue(&extruder::status_request()?, Readback::Status)?;
        }
        if now >= *heater_due {
            *heater_due = now + self.config.heater_interval;
            pipeline.send_and_enqueue(&extruder::heater_pvsv_request()?, Readback::HeaterPvSv)?;
        }
        if now >= *motor_due {
            *motor_due = now + self.config.motor_interval;
            pipeline.send_and_enqueue(&extruder::motor_pvsv_request()?, Readback::MotorPvSv)?;
        }

        Ok(())
    }

    /// The fault path: fail-safe registers, cleared queue, best-effort
    /// disable. The session itself is dropped by the caller.
    fn enter_fail_safe<L: ByteLink>(&mut self, pipeline: &mut Pipeline<L, Readback>) {
        debug!("entering fail-safe state");
        lock_registers(&self.registers).fail_safe();
        pipeline.clear_pending();
        if let Ok(packet) = extruder::disable_command() {
            let _ = pipeline.port_mut().send(&packet);
        }
    }
}
