//! Group-head flush on a long press of a momentary brew switch.

use log::{debug, info};

use super::brew_switch::{BrewSwitch, BrewSwitchState};
use crate::fsm::context::ActuatorCommands;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushState {
    #[default]
    Idle,
    Running,
}

#[derive(Debug, Clone, Default)]
pub struct ManualFlush {
    state: FlushState,
    started_ms: u64,
    elapsed_ms: u64,
}

impl ManualFlush {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FlushState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == FlushState::Running
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Returns `true` while the flush runs.
    pub fn run(
        &mut self,
        now_ms: u64,
        switch_enabled: bool,
        brew_idle: bool,
        switch: &BrewSwitch,
        cmd: &mut ActuatorCommands,
    ) -> bool {
        if !switch_enabled {
            self.abort(cmd);
            return false;
        }

        let long_pressed = switch.state() == BrewSwitchState::LongPressed;
        match self.state {
            FlushState::Idle => {
                if long_pressed && brew_idle {
                    info!("manual flush: started");
                    self.started_ms = now_ms;
                    self.elapsed_ms = 0;
                    cmd.valve = true;
                    cmd.pump = true;
                    self.set_state(FlushState::Running);
                }
            }
            FlushState::Running => {
                self.elapsed_ms = now_ms.saturating_sub(self.started_ms);
                if long_pressed {
                    cmd.valve = true;
                    cmd.pump = true;
                } else {
                    self.stop(cmd);
                }
            }
        }

        self.is_running()
    }

    /// Stop immediately.  No-op when idle.
    pub fn abort(&mut self, cmd: &mut ActuatorCommands) {
        if self.is_running() {
            self.stop(cmd);
        }
    }

    fn stop(&mut self, cmd: &mut ActuatorCommands) {
        cmd.valve = false;
        cmd.pump = false;
        info!("manual flush: stopped after {:.1} s", self.elapsed_ms as f32 / 1000.0);
        self.set_state(FlushState::Idle);
    }

    fn set_state(&mut self, next: FlushState) {
        if next != self.state {
            debug!("manual flush: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::switch::SwitchKind;
    use crate::fsm::context::SwitchReading;

    fn long_pressed_switch() -> BrewSwitch {
        let mut sw = BrewSwitch::new();
        sw.update(SwitchReading { pressed: true, long_press: false }, SwitchKind::Momentary);
        sw.update(SwitchReading { pressed: true, long_press: true }, SwitchKind::Momentary);
        sw
    }

    #[test]
    fn runs_while_long_pressed() {
        let mut sw = long_pressed_switch();
        let mut flush = ManualFlush::new();
        let mut cmd = ActuatorCommands::default();

        assert!(flush.run(1_000, true, true, &sw, &mut cmd));
        assert!(cmd.valve && cmd.pump);
        assert!(flush.run(4_000, true, true, &sw, &mut cmd));
        assert_eq!(flush.elapsed_ms(), 3_000);

        sw.update(SwitchReading::default(), SwitchKind::Momentary);
        assert!(!flush.run(4_100, true, true, &sw, &mut cmd));
        assert!(!cmd.valve && !cmd.pump);
    }

    #[test]
    fn needs_idle_brew() {
        let sw = long_pressed_switch();
        let mut flush = ManualFlush::new();
        let mut cmd = ActuatorCommands::default();
        assert!(!flush.run(0, true, false, &sw, &mut cmd));
        assert!(!flush.run(0, false, true, &sw, &mut cmd));
    }

    #[test]
    fn switch_disabled_mid_flush_stops() {
        let sw = long_pressed_switch();
        let mut flush = ManualFlush::new();
        let mut cmd = ActuatorCommands::default();
        assert!(flush.run(0, true, true, &sw, &mut cmd));
        assert!(cmd.valve && cmd.pump);

        assert!(!flush.run(500, false, true, &sw, &mut cmd));
        assert_eq!(flush.state(), FlushState::Idle);
        assert!(!cmd.valve && !cmd.pump);
    }

    #[test]
    fn abort_is_idempotent() {
        let sw = long_pressed_switch();
        let mut flush = ManualFlush::new();
        let mut cmd = ActuatorCommands::default();
        flush.run(0, true, true, &sw, &mut cmd);
        flush.abort(&mut cmd);
        assert_eq!(flush.state(), FlushState::Idle);
        assert!(!cmd.valve && !cmd.pump);
        flush.abort(&mut cmd);
        assert_eq!(flush.state(), FlushState::Idle);
    }
}
