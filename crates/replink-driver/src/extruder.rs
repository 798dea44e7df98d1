use replink_frame::Packet;
use tracing::debug;

use crate::error::Result;
use crate::registers::Registers;

/// Fixed bus address of the controller board.
pub const DEVICE_ADDRESS: u8 = 0;

/// Command bytes understood by the controller firmware.
pub const CMD_READ_STATUS: u8 = 80;
pub const CMD_ENABLE: u8 = 81;
pub const CMD_DISABLE: u8 = 82;
pub const CMD_READ_HEATER_PVSV: u8 = 91;
pub const CMD_SET_HEATER_SV: u8 = 92;
pub const CMD_READ_MOTOR_PVSV: u8 = 95;
pub const CMD_MOTOR_REL_POS: u8 = 96;
pub const CMD_MOTOR_SPEED: u8 = 97;
pub const CMD_MOTOR_PWM: u8 = 98;
pub const CMD_MOTOR_TUNING: u8 = 100;

/// PWM duty levels for the manual jog inputs.
const PWM_OFF: u8 = 0;
const PWM_SLOW: u8 = 128;
const PWM_FAST: u8 = 192;

/// What to do with the reply correlated to a sent command.
///
/// Handlers are data, not callbacks: the pipeline pops one of these per
/// reply and [`ExtruderMap::apply`] dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readback {
    /// Reply carries nothing the register bank cares about.
    Ignore,
    /// Status flags and fault bits.
    Status,
    /// Acknowledgement of enable/disable; clears the estop edge latch.
    Enable,
    /// Heater process/set value pair.
    HeaterPvSv,
    /// Motor process/set value pair.
    MotorPvSv,
}

/// Start a command packet: address byte, then the command byte.
fn command(cmd: u8) -> Result<Packet> {
    let mut packet = Packet::new();
    packet.push_u8(DEVICE_ADDRESS)?;
    packet.push_u8(cmd)?;
    Ok(packet)
}

/// Status poll request.
pub fn status_request() -> Result<Packet> {
    command(CMD_READ_STATUS)
}

/// Heater PV/SV poll request.
pub fn heater_pvsv_request() -> Result<Packet> {
    command(CMD_READ_HEATER_PVSV)
}

/// Motor PV/SV poll request.
pub fn motor_pvsv_request() -> Result<Packet> {
    command(CMD_READ_MOTOR_PVSV)
}

/// Enable or disable the device.
pub fn enable_command(enable: bool) -> Result<Packet> {
    command(if enable { CMD_ENABLE } else { CMD_DISABLE })
}

/// The best-effort stop command sent on faults and operator interrupt.
pub fn disable_command() -> Result<Packet> {
    command(CMD_DISABLE)
}

/// Set the heater target temperature.
pub fn heater_sv_command(sv: i32) -> Result<Packet> {
    let mut packet = command(CMD_SET_HEATER_SV)?;
    packet.push_u16(sv as u16)?;
    Ok(packet)
}

/// Edge-triggered input registers, one entry per slot in the static
/// trigger table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    MotorRelPos,
    MotorSpeed,
    PwmReverseFast,
    PwmReverseSlow,
    PwmForwardSlow,
    PwmForwardFast,
    MotorTuning,
}

const TRIGGER_TABLE: [Trigger; 7] = [
    Trigger::MotorRelPos,
    Trigger::MotorSpeed,
    Trigger::PwmReverseFast,
    Trigger::PwmReverseSlow,
    Trigger::PwmForwardSlow,
    Trigger::PwmForwardFast,
    Trigger::MotorTuning,
];

#[derive(Debug, Clone, Copy)]
struct TriggerSlot {
    trigger: Trigger,
    previous: bool,
}

/// Maps the register bank onto wire commands and decodes replies back into
/// registers.
///
/// Holds the per-session edge-detection state: previous samples for the
/// trigger table, the enable level, the last heater setpoint written, and
/// the device-side estop latch.
#[derive(Debug)]
pub struct ExtruderMap {
    slots: [TriggerSlot; TRIGGER_TABLE.len()],
    enable_level: bool,
    heater_sv_level: i32,
    device_estop: bool,
}

impl Default for ExtruderMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtruderMap {
    pub fn new() -> Self {
        let slots = TRIGGER_TABLE.map(|trigger| TriggerSlot {
            trigger,
            previous: false,
        });
        Self {
            slots,
            enable_level: false,
            heater_sv_level: 0,
            device_estop: false,
        }
    }

    /// Sample the input registers and emit commands for every level change
    /// or rising trigger since the previous scan.
    pub fn scan(&mut self, regs: &Registers) -> Result<Vec<(Packet, Readback)>> {
        let mut out = Vec::new();

        if self.enable_level != regs.enable {
            self.enable_level = regs.enable;
            debug!(enable = regs.enable, "enable register changed");
            out.push((enable_command(regs.enable)?, Readback::Enable));
        }

        if self.heater_sv_level != regs.heater_set_sv {
            self.heater_sv_level = regs.heater_set_sv;
            debug!(sv = regs.heater_set_sv, "heater setpoint changed");
            out.push((heater_sv_command(regs.heater_set_sv)?, Readback::Ignore));
        }

        for slot in self.slots.iter_mut() {
            let current = sample(slot.trigger, regs);
            if slot.previous == current {
                continue;
            }
            slot.previous = current;
            if let Some(packet) = fire(slot.trigger, current, regs)? {
                out.push((packet, Readback::Ignore));
            }
        }

        Ok(out)
    }

    /// Decode one correlated reply into the register bank.
    pub fn apply(&mut self, readback: Readback, packet: &Packet, regs: &mut Registers) {
        match readback {
            Readback::Ignore => {}
            Readback::Status => {
                let flags = packet.u8_at(1);
                let device_estop = flags & 0x01 != 0;
                // Only a rising device-side estop raises the outward
                // register; the level itself stays latched here.
                regs.estop = device_estop && !self.device_estop;
                self.device_estop = device_estop;

                regs.online = flags & 0x02 != 0;
                regs.fault_thermistor_disconnected = packet.u8_at(2) != 0;
                regs.fault_heater_response = packet.u8_at(3) != 0;
                regs.fault_motor_jammed = packet.u8_at(4) != 0;
                regs.fault_no_plastic = packet.u8_at(5) != 0;
                regs.heater_on = packet.u8_at(6) != 0;
            }
            Readback::Enable => {
                self.device_estop = false;
            }
            Readback::HeaterPvSv => {
                regs.heater_pv = f64::from(packet.u16_at(1));
                regs.heater_sv = f64::from(packet.u16_at(3));
            }
            Readback::MotorPvSv => {
                regs.motor_pv = u32::from(packet.u16_at(1));
                regs.motor_sv = u32::from(packet.u16_at(3));
            }
        }
    }
}

fn sample(trigger: Trigger, regs: &Registers) -> bool {
    match trigger {
        Trigger::MotorRelPos => regs.motor_rel_pos_trigger,
        Trigger::MotorSpeed => regs.motor_speed_trigger,
        Trigger::PwmReverseFast => regs.motor_pwm_reverse_fast,
        Trigger::PwmReverseSlow => regs.motor_pwm_reverse_slow,
        Trigger::PwmForwardSlow => regs.motor_pwm_forward_slow,
        Trigger::PwmForwardFast => regs.motor_pwm_forward_fast,
        Trigger::MotorTuning => regs.motor_tuning_trigger,
    }
}

/// Build the command for a changed trigger, if the change warrants one.
///
/// One-shot triggers fire on the rising edge only; the PWM jog inputs fire
/// on both edges (the falling edge stops the motor).
fn fire(trigger: Trigger, value: bool, regs: &Registers) -> Result<Option<Packet>> {
    match trigger {
        Trigger::MotorRelPos => {
            if !value {
                return Ok(None);
            }
            let mut packet = command(CMD_MOTOR_REL_POS)?;
            packet.push_u16(regs.motor_rel_pos as u16)?;
            Ok(Some(packet))
        }
        Trigger::MotorSpeed => {
            if !value {
                return Ok(None);
            }
            let mut packet = command(CMD_MOTOR_SPEED)?;
            packet.push_u16(regs.motor_speed as u16)?;
            Ok(Some(packet))
        }
        Trigger::PwmReverseFast | Trigger::PwmReverseSlow | Trigger::PwmForwardSlow
        | Trigger::PwmForwardFast => {
            let forward = matches!(
                trigger,
                Trigger::PwmForwardSlow | Trigger::PwmForwardFast
            );
            let fast = matches!(
                trigger,
                Trigger::PwmReverseFast | Trigger::PwmForwardFast
            );
            let duty = if !value {
                PWM_OFF
            } else if fast {
                PWM_FAST
            } else {
                PWM_SLOW
            };

            let mut packet = command(CMD_MOTOR_PWM)?;
            packet.push_u8(forward as u8)?;
            packet.push_u8(duty)?;
            Ok(Some(packet))
        }
        Trigger::MotorTuning => {
            if !value {
                return Ok(None);
            }
            let tuning = &regs.motor_tuning;
            let mut packet = command(CMD_MOTOR_TUNING)?;
            packet.push_u16(tuning_term(tuning.p) as u16)?;
            packet.push_u16(tuning_term(tuning.i) as u16)?;
            packet.push_u16(tuning_term(tuning.d) as u16)?;
            packet.push_u16(tuning_term(tuning.i_limit) as u16)?;
            packet.push_u8(tuning.deadband as u8)?;
            packet.push_u8(tuning.min_output as u8)?;
            Ok(Some(packet))
        }
    }
}

/// Scale one tuning exponent to the firmware's fixed-point term: `±2^|x|`,
/// with zero passed through.
fn tuning_term(exponent: f64) -> i32 {
    if exponent > 0.0 {
        2f64.powf(exponent.abs()) as i32
    } else if exponent < 0.0 {
        -(2f64.powf(exponent.abs()) as i32)
    } else {
        0
    }
}
