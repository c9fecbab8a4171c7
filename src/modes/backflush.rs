//! Backflush cleaning cycle against a blind basket.
//!
//! ```text
//!  IDLE ──[flag on + fresh press]──▶ FILLING ──[fill]──▶ FLUSHING ──[flush]──┐
//!    ▲                                  ▲                                     │
//!    │                                  └────────[cycle < cycles]─────────────┤
//!    └──────────────── FINISHED ◀────────────[cycle == cycles]────────────────┘
//! ```

use log::{debug, info};

use super::brew_switch::{BrewSwitch, BrewSwitchState};
use crate::config::{BackflushSettings, secs_to_ms};
use crate::fsm::context::ActuatorCommands;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackflushState {
    #[default]
    Idle,
    Filling,
    Flushing,
    Finished,
}

impl BackflushState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Filling | Self::Flushing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackflushInputs {
    pub now_ms: u64,
    pub switch_enabled: bool,
    pub backflush_on: bool,
    pub brew_idle: bool,
}

#[derive(Debug, Clone)]
pub struct BackflushContext {
    state: BackflushState,
    cycle: u32,
    started_ms: u64,
    elapsed_ms: u64,
    unreported: Option<u32>,
}

impl Default for BackflushContext {
    fn default() -> Self {
        Self {
            state: BackflushState::Idle,
            cycle: 1,
            started_ms: 0,
            elapsed_ms: 0,
            unreported: None,
        }
    }
}

impl BackflushContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BackflushState {
        self.state
    }

    /// Current cycle, 1-based.
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Time in the current fill or flush step.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Cycles completed by a backflush that ended since the last call.
    pub fn take_finished(&mut self) -> Option<u32> {
        self.unreported.take()
    }

    /// Returns `true` while filling or flushing.
    pub fn run(
        &mut self,
        inputs: &BackflushInputs,
        settings: &BackflushSettings,
        switch: &mut BrewSwitch,
        cmd: &mut ActuatorCommands,
    ) -> bool {
        if !inputs.switch_enabled {
            self.abort(switch, cmd);
            return false;
        }

        if self.state != BackflushState::Idle && (!inputs.backflush_on || settings.cycles <= 0) {
            info!("backflush: disabled while running");
            self.set_state(BackflushState::Finished);
        } else if !inputs.brew_idle || settings.cycles <= 0 || !inputs.backflush_on {
            return self.state.is_active();
        }

        if switch.state() == BrewSwitchState::Idle && self.state.is_active() {
            info!("backflush: stopped manually");
            self.set_state(BackflushState::Finished);
        }

        if self.state.is_active() {
            self.elapsed_ms = inputs.now_ms.saturating_sub(self.started_ms);
        }

        while self.step(inputs, settings, switch, cmd) {}

        self.state.is_active()
    }

    /// Force the cycle to its end.  No-op when idle.
    pub fn abort(&mut self, switch: &mut BrewSwitch, cmd: &mut ActuatorCommands) {
        if self.state != BackflushState::Idle {
            info!("backflush: aborted");
            self.finish(switch, cmd);
        }
    }

    fn step(
        &mut self,
        inputs: &BackflushInputs,
        settings: &BackflushSettings,
        switch: &mut BrewSwitch,
        cmd: &mut ActuatorCommands,
    ) -> bool {
        match self.state {
            BackflushState::Idle => {
                if switch.is_fresh_press() {
                    info!("backflush: cycle {} filling", self.cycle);
                    self.begin_step(inputs.now_ms);
                    self.set_state(BackflushState::Filling);
                    return true;
                }
                false
            }

            BackflushState::Filling => {
                cmd.valve = true;
                cmd.pump = true;
                if self.elapsed_ms >= secs_to_ms(settings.fill_s) {
                    debug!("backflush: cycle {} flushing", self.cycle);
                    self.begin_step(inputs.now_ms);
                    self.set_state(BackflushState::Flushing);
                    return true;
                }
                false
            }

            BackflushState::Flushing => {
                cmd.valve = false;
                cmd.pump = false;
                if self.elapsed_ms < secs_to_ms(settings.flush_s) {
                    return false;
                }
                // cycles > 0 is guaranteed by the guard in run()
                if self.cycle < settings.cycles.unsigned_abs() {
                    self.cycle += 1;
                    info!("backflush: cycle {} filling", self.cycle);
                    self.begin_step(inputs.now_ms);
                    self.set_state(BackflushState::Filling);
                } else {
                    self.set_state(BackflushState::Finished);
                }
                true
            }

            BackflushState::Finished => {
                self.finish(switch, cmd);
                false
            }
        }
    }

    fn begin_step(&mut self, now_ms: u64) {
        self.started_ms = now_ms;
        self.elapsed_ms = 0;
    }

    fn finish(&mut self, switch: &mut BrewSwitch, cmd: &mut ActuatorCommands) {
        cmd.valve = false;
        cmd.pump = false;
        info!("backflush: finished after {} cycles", self.cycle);
        self.unreported = Some(self.cycle);
        self.cycle = 1;
        switch.finish_cycle();
        self.set_state(BackflushState::Idle);
    }

    fn set_state(&mut self, next: BackflushState) {
        if next != self.state {
            debug!("backflush: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
