//! Boiler temperature PID and over-temperature latch.
//!
//! Classic Kp/Tn/Tv form (`ki = kp / tn`, `kd = kp * tv`) producing the
//! heater on-time per 1000 ms relay window.  The output is recomputed once
//! per window; the 10 ms heater timer does the switching.

use log::{debug, warn};

use crate::config::{HeaterSettings, secs_to_ms};
use crate::drivers::heater::WINDOW_MS;
use crate::fsm::MachineState;

/// Latch the emergency stop above this boiler temperature.
pub const EMERGENCY_STOP_C: f32 = 145.0;
/// Release once the boiler is back under `setpoint + this`.
pub const EMERGENCY_RELEASE_MARGIN_C: f32 = 5.0;

/// Update the over-temperature latch.
pub fn emergency_stop(active: bool, temperature_c: f32, setpoint_c: f32) -> bool {
    if temperature_c > EMERGENCY_STOP_C {
        if !active {
            warn!("heater: emergency stop at {:.1} °C", temperature_c);
        }
        true
    } else if active && temperature_c < setpoint_c + EMERGENCY_RELEASE_MARGIN_C {
        debug!("heater: emergency stop cleared at {:.1} °C", temperature_c);
        false
    } else {
        active
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaterInputs {
    pub now_ms: u64,
    pub machine: MachineState,
    pub temperature_c: f32,
    /// Steam flag from the switch or a command.
    pub steam_on: bool,
    /// Milliseconds since the current shot started.
    pub brew_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureController {
    integral: f32,
    prev_temp: Option<f32>,
    last_compute_ms: Option<u64>,
    output_ms: u32,
}

impl TemperatureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_ms(&self) -> u32 {
        self.output_ms
    }

    /// Active setpoint for this machine state.
    pub fn setpoint(settings: &HeaterSettings, machine: MachineState, steam_on: bool) -> f32 {
        if machine == MachineState::Steam || steam_on {
            settings.steam_setpoint_c
        } else {
            settings.setpoint_c
        }
    }

    pub fn tick(&mut self, inputs: &HeaterInputs, settings: &HeaterSettings, brew_pid_delay_s: f32) -> u32 {
        if heater_off_in(inputs.machine) || !settings.enabled {
            self.reset();
            return 0;
        }

        if inputs.machine == MachineState::Brew && inputs.brew_ms < secs_to_ms(brew_pid_delay_s) {
            return self.output_ms;
        }

        if self
            .last_compute_ms
            .is_some_and(|last| inputs.now_ms.saturating_sub(last) < u64::from(WINDOW_MS))
        {
            return self.output_ms;
        }
        self.last_compute_ms = Some(inputs.now_ms);

        let steam = inputs.machine == MachineState::Steam || inputs.steam_on;
        let (kp, ki, kd) = if steam {
            (settings.steam_kp, 0.0, 0.0)
        } else {
            let ki = if settings.tn > 0.0 { settings.kp / settings.tn } else { 0.0 };
            (settings.kp, ki, settings.kp * settings.tv)
        };
        let setpoint = Self::setpoint(settings, inputs.machine, inputs.steam_on);
        let window = WINDOW_MS as f32;
        let dt = window / 1000.0;

        let error = setpoint - inputs.temperature_c;
        if ki > 0.0 {
            let bound = settings.i_max / 100.0 * window / ki;
            self.integral = (self.integral + error * dt).clamp(-bound, bound);
        } else {
            self.integral = 0.0;
        }
        let derivative = self
            .prev_temp
            .map_or(0.0, |prev| (inputs.temperature_c - prev) / dt);
        self.prev_temp = Some(inputs.temperature_c);

        let out = kp * error + ki * self.integral - kd * derivative;
        self.output_ms = out.clamp(0.0, window) as u32;
        self.output_ms
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_temp = None;
        self.last_compute_ms = None;
        self.output_ms = 0;
    }
}

fn heater_off_in(machine: MachineState) -> bool {
    matches!(
        machine,
        MachineState::PidDisabled
            | MachineState::WaterTankEmpty
            | MachineState::SensorError
            | MachineState::EmergencyStop
            | MachineState::EepromError
            | MachineState::Standby
            | MachineState::Backflush
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(machine: MachineState, now_ms: u64, temp: f32) -> HeaterInputs {
        HeaterInputs {
            now_ms,
            machine,
            temperature_c: temp,
            steam_on: false,
            brew_ms: 0,
        }
    }

    #[test]
    fn emergency_latch_hysteresis() {
        assert!(!emergency_stop(false, 140.0, 95.0));
        assert!(emergency_stop(false, 146.0, 95.0));
        assert!(emergency_stop(true, 120.0, 95.0));
        assert!(emergency_stop(true, 100.0, 95.0));
        assert!(!emergency_stop(true, 99.9, 95.0));
    }

    #[test]
    fn cold_boiler_saturates() {
        let mut t = TemperatureController::new();
        let s = HeaterSettings::default();
        assert_eq!(t.tick(&inputs(MachineState::PidNormal, 0, 20.0), &s, 10.0), WINDOW_MS);
    }

    #[test]
    fn hot_boiler_is_off() {
        let mut t = TemperatureController::new();
        let s = HeaterSettings::default();
        assert_eq!(t.tick(&inputs(MachineState::PidNormal, 0, 110.0), &s, 10.0), 0);
    }

    #[test]
    fn recomputes_once_per_window() {
        let mut t = TemperatureController::new();
        let s = HeaterSettings::default();
        let first = t.tick(&inputs(MachineState::PidNormal, 0, 94.0), &s, 10.0);
        assert!(first > 0);
        assert_eq!(t.tick(&inputs(MachineState::PidNormal, 500, 130.0), &s, 10.0), first);
        assert_eq!(t.tick(&inputs(MachineState::PidNormal, 1_000, 130.0), &s, 10.0), 0);
    }

    #[test]
    fn disabled_states_force_zero() {
        let mut t = TemperatureController::new();
        let s = HeaterSettings::default();
        t.tick(&inputs(MachineState::PidNormal, 0, 20.0), &s, 10.0);
        for m in [MachineState::Backflush, MachineState::Standby, MachineState::EmergencyStop] {
            assert_eq!(t.tick(&inputs(m, 5_000, 20.0), &s, 10.0), 0);
        }
    }

    #[test]
    fn brew_delay_holds_output() {
        let mut t = TemperatureController::new();
        let s = HeaterSettings::default();
        let before = t.tick(&inputs(MachineState::PidNormal, 0, 93.0), &s, 10.0);
        let mut inp = inputs(MachineState::Brew, 2_000, 60.0);
        inp.brew_ms = 1_000;
        assert_eq!(t.tick(&inp, &s, 10.0), before);
        inp.brew_ms = 10_000;
        assert_eq!(t.tick(&inp, &s, 10.0), WINDOW_MS);
    }

    #[test]
    fn steam_uses_steam_setpoint_and_gain() {
        let mut t = TemperatureController::new();
        let s = HeaterSettings::default();
        let mut inp = inputs(MachineState::Steam, 0, 119.0);
        // 150 * 1 K = 150 ms, no integral or derivative
        assert_eq!(t.tick(&inp, &s, 10.0), 150);
        inp.machine = MachineState::PidNormal;
        inp.steam_on = true;
        assert_eq!(TemperatureController::setpoint(&s, inp.machine, inp.steam_on), 120.0);
    }
}
