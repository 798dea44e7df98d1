use std::sync::{Arc, Mutex, MutexGuard};

/// Motor PID tuning inputs.
///
/// P/I/D/iLimit are exponents: the wire value is `±2^|x|`, zero staying
/// zero, matching the firmware's fixed-point tuning command.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct MotorTuning {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub i_limit: f64,
    pub deadband: i32,
    pub min_output: i32,
}

/// The typed register bank shared with the host control interface.
///
/// Outward registers are the driver's only health signal; input registers
/// are sampled once per control-loop tick. Level-held trigger bits are
/// turned into one-shot commands by the supervisor's edge detection.
#[derive(Debug, Default, Clone)]
pub struct Registers {
    // Outward health registers.
    pub connected: bool,
    pub online: bool,
    pub estop: bool,

    // Outward fault registers, decoded from status replies.
    pub fault_thermistor_disconnected: bool,
    pub fault_heater_response: bool,
    pub fault_motor_jammed: bool,
    pub fault_no_plastic: bool,

    // Outward process values.
    pub heater_pv: f64,
    pub heater_sv: f64,
    pub heater_on: bool,
    pub motor_pv: u32,
    pub motor_sv: u32,

    // Input registers.
    pub enable: bool,
    pub heater_set_sv: i32,
    pub motor_rel_pos: i32,
    pub motor_rel_pos_trigger: bool,
    pub motor_speed: i32,
    pub motor_speed_trigger: bool,
    pub motor_pwm_reverse_fast: bool,
    pub motor_pwm_reverse_slow: bool,
    pub motor_pwm_forward_slow: bool,
    pub motor_pwm_forward_fast: bool,
    pub motor_tuning_trigger: bool,
    pub motor_tuning: MotorTuning,
}

impl Registers {
    /// A fresh register bank behind a shared handle.
    pub fn shared() -> RegisterHandle {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Assert the fail-safe outward state: not connected, emergency stop
    /// raised, not online. Entered on every session fault; estop clears
    /// only once a later session decodes a clean status reply.
    pub fn fail_safe(&mut self) {
        self.connected = false;
        self.online = false;
        self.estop = true;
    }
}

/// Shared handle to the register bank.
pub type RegisterHandle = Arc<Mutex<Registers>>;

/// Lock a register handle, recovering the inner state if a panicking holder
/// poisoned the mutex.
pub fn lock_registers(handle: &RegisterHandle) -> MutexGuard<'_, Registers> {
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_safe_asserts_outward_state() {
        let mut regs = Registers::default();
        regs.connected = true;
        regs.online = true;
        regs.estop = false;

        regs.fail_safe();

        assert!(!regs.connected);
        assert!(!regs.online);
        assert!(regs.estop);
    }

    #[test]
    fn fail_safe_leaves_inputs_untouched() {
        let mut regs = Registers::default();
        regs.enable = true;
        regs.heater_set_sv = 220;

        regs.fail_safe();

        assert!(regs.enable);
        assert_eq!(regs.heater_set_sv, 220);
    }

    #[test]
    fn shared_handle_roundtrip() {
        let handle = Registers::shared();
        lock_registers(&handle).heater_set_sv = 185;
        assert_eq!(lock_registers(&handle).heater_set_sv, 185);
    }
}
