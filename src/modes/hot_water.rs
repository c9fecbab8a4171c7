//! Hot water draw through the steam-wand tap: pump only, valve closed.

use log::debug;

use crate::drivers::switch::SwitchKind;
use crate::fsm::context::{ActuatorCommands, SwitchReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HotWaterState {
    #[default]
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HotWaterInputs {
    pub hot_water_on: bool,
    /// Tank empty, over-temperature, sensor fault or heater disabled.
    pub stop_condition: bool,
    /// Brew, manual flush or backflush in progress.
    pub brew_busy: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HotWaterContext {
    state: HotWaterState,
}

impl HotWaterContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HotWaterState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == HotWaterState::Running
    }

    /// Returns `true` while the pump runs for hot water.
    pub fn run(&mut self, inputs: &HotWaterInputs, cmd: &mut ActuatorCommands) -> bool {
        match self.state {
            HotWaterState::Idle => {
                if inputs.hot_water_on && !inputs.stop_condition && !inputs.brew_busy {
                    self.set_state(HotWaterState::Running);
                    cmd.pump = true;
                }
            }
            HotWaterState::Running => {
                let released = !inputs.hot_water_on && !inputs.brew_busy;
                if released || inputs.stop_condition {
                    self.stop(cmd);
                } else {
                    cmd.pump = true;
                }
            }
            HotWaterState::Stopped => {
                cmd.pump = false;
                if !inputs.stop_condition {
                    self.set_state(HotWaterState::Idle);
                }
            }
        }
        self.is_running()
    }

    /// Stop the draw.  No-op unless running.
    pub fn abort(&mut self, cmd: &mut ActuatorCommands) {
        if self.is_running() {
            self.stop(cmd);
        }
    }

    fn stop(&mut self, cmd: &mut ActuatorCommands) {
        cmd.pump = false;
        self.set_state(HotWaterState::Stopped);
    }

    fn set_state(&mut self, next: HotWaterState) {
        if next != self.state {
            debug!("hot water: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

/// Derives the hot-water request from the hot-water switch.
///
/// A toggle switch is the request; a momentary one flips it on each press.
#[derive(Debug, Clone, Copy, Default)]
pub struct HotWaterRequest {
    on: bool,
    last_pressed: bool,
}

impl HotWaterRequest {
    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn update(&mut self, reading: Option<SwitchReading>, kind: SwitchKind, pid_disabled: bool) -> bool {
        let Some(reading) = reading else {
            self.on = false;
            return false;
        };

        match kind {
            SwitchKind::Toggle => self.on = reading.pressed,
            SwitchKind::Momentary => {
                if reading.pressed && !self.last_pressed {
                    self.on = !self.on;
                }
                if pid_disabled {
                    self.on = false;
                }
            }
        }
        self.last_pressed = reading.pressed;
        self.on
    }
}
