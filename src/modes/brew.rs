//! Brew sequencing: pre-infusion, pause, extraction, stop by time or weight.
//!
//! ```text
//!  IDLE ──[fresh short press]──▶ PREINFUSION ──[pre]──▶ PAUSE ──[pre+pause]──▶ RUNNING
//!    ▲                                                                          │
//!    └───────────────────────── FINISHED ◀──[time | weight | switch off]─────────┘
//! ```
//!
//! With `brew.mode = 0` the pump and valve hang off the switch contactor;
//! the machine then only times the shot (IDLE → RUNNING → FINISHED).

use log::{debug, info};

use super::brew_switch::{BrewSwitch, BrewSwitchState};
use crate::config::BrewSettings;
use crate::fsm::context::ActuatorCommands;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrewState {
    #[default]
    Idle,
    Preinfusion,
    PreinfusionPause,
    Running,
    Finished,
}

impl BrewState {
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Finished)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrewInputs {
    pub now_ms: u64,
    /// Brew switch fitted and enabled.
    pub switch_enabled: bool,
    pub backflush_on: bool,
    pub weight_g: f32,
    /// Scale enabled in config and currently connected.
    pub scale_ready: bool,
}

/// Result of the last completed shot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastShot {
    pub duration_ms: u64,
    /// Only recorded when a scale was in use.
    pub weight_g: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct BrewContext {
    state: BrewState,
    started_ms: u64,
    elapsed_ms: u64,
    start_weight_g: f32,
    shot_weight_g: f32,
    scale_used: bool,
    last_shot: Option<LastShot>,
    unreported: Option<LastShot>,
}

impl BrewContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BrewState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Time since the shot started; holds the final value after it ends.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Weight gained since the shot started.
    pub fn shot_weight_g(&self) -> f32 {
        self.shot_weight_g
    }

    pub fn last_shot(&self) -> Option<LastShot> {
        self.last_shot
    }

    /// The shot completed since the previous call, if any.
    pub fn take_finished_shot(&mut self) -> Option<LastShot> {
        self.unreported.take()
    }

    /// Advance the brew machine.  Returns `true` while a shot is running.
    pub fn run(
        &mut self,
        inputs: &BrewInputs,
        settings: &BrewSettings,
        switch: &mut BrewSwitch,
        cmd: &mut ActuatorCommands,
    ) -> bool {
        if !inputs.switch_enabled {
            return false;
        }

        if self.state.is_active() {
            self.elapsed_ms = inputs.now_ms.saturating_sub(self.started_ms);
            if inputs.scale_ready {
                self.shot_weight_g = inputs.weight_g - self.start_weight_g;
            }
        }

        if switch.state() == BrewSwitchState::Idle && self.state.is_active() {
            info!("brew: stopped manually");
            self.set_state(BrewState::Finished);
        }

        while self.step(inputs, settings, switch, cmd) {}

        self.state.is_active()
    }

    /// Force the current shot to its end.  No-op when idle.
    pub fn abort(&mut self, switch: &mut BrewSwitch, cmd: &mut ActuatorCommands) {
        if self.state == BrewState::Idle {
            return;
        }
        info!("brew: aborted");
        self.finish(switch, cmd, true);
    }

    /// One state evaluation.  Returns `true` when the new state must be
    /// processed in the same call.
    fn step(
        &mut self,
        inputs: &BrewInputs,
        settings: &BrewSettings,
        switch: &mut BrewSwitch,
        cmd: &mut ActuatorCommands,
    ) -> bool {
        let controlled = settings.controlled;
        let (pre_ms, pause_ms) = settings.preinfusion_ms();

        match self.state {
            BrewState::Idle => {
                if !switch.is_fresh_press() || inputs.backflush_on {
                    return false;
                }
                self.start(inputs);
                if !controlled || (pre_ms == 0 && pause_ms == 0) {
                    self.set_state(BrewState::Running);
                } else {
                    self.set_state(BrewState::Preinfusion);
                }
                true
            }

            BrewState::Preinfusion => {
                if !controlled {
                    self.set_state(BrewState::Running);
                    return true;
                }
                cmd.valve = true;
                cmd.pump = true;
                if self.elapsed_ms >= pre_ms {
                    self.set_state(BrewState::PreinfusionPause);
                    return true;
                }
                false
            }

            BrewState::PreinfusionPause => {
                if !controlled {
                    self.set_state(BrewState::Running);
                    return true;
                }
                cmd.valve = true;
                cmd.pump = false;
                if self.elapsed_ms >= pre_ms + pause_ms {
                    self.set_state(BrewState::Running);
                    return true;
                }
                false
            }

            BrewState::Running => {
                if !controlled {
                    // contactor mode: the switch release ends the shot
                    return false;
                }
                cmd.valve = true;
                cmd.pump = true;

                if settings
                    .total_target_ms()
                    .is_some_and(|target| self.elapsed_ms >= target)
                {
                    info!("brew: time target reached");
                    self.set_state(BrewState::Finished);
                    return true;
                }

                let target_g = settings.target_weight_g;
                if inputs.scale_ready && settings.by_weight && target_g > 0.0 && self.shot_weight_g >= target_g {
                    info!("brew: weight target reached ({:.1} g)", self.shot_weight_g);
                    self.set_state(BrewState::Finished);
                    return true;
                }
                false
            }

            BrewState::Finished => {
                self.finish(switch, cmd, controlled);
                false
            }
        }
    }

    fn start(&mut self, inputs: &BrewInputs) {
        info!("brew: started");
        self.started_ms = inputs.now_ms;
        self.elapsed_ms = 0;
        self.start_weight_g = if inputs.scale_ready { inputs.weight_g } else { 0.0 };
        self.shot_weight_g = 0.0;
        self.scale_used = inputs.scale_ready;
    }

    fn finish(&mut self, switch: &mut BrewSwitch, cmd: &mut ActuatorCommands, controlled: bool) {
        if controlled {
            cmd.valve = false;
            cmd.pump = false;
        }

        let shot = LastShot {
            duration_ms: self.elapsed_ms,
            weight_g: self.scale_used.then_some(self.shot_weight_g),
        };
        match shot.weight_g {
            Some(w) => info!("brew: finished, shot time {:.1} s, {:.1} g", shot.duration_ms as f32 / 1000.0, w),
            None => info!("brew: finished, shot time {:.1} s", shot.duration_ms as f32 / 1000.0),
        }
        self.last_shot = Some(shot);
        self.unreported = Some(shot);

        switch.finish_cycle();
        self.set_state(BrewState::Idle);
    }

    fn set_state(&mut self, next: BrewState) {
        if next != self.state {
            debug!("brew: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
