//! Brew switch press classifier.
//!
//! Turns the debounced brew switch level into the press states the brew,
//! manual flush and backflush machines act on:
//!
//! ```text
//!  toggle:     IDLE ──on──▶ SHORT ──cycle done──▶ WAIT ──off──▶ IDLE
//!                             └────────────off───────────────▶ IDLE
//!
//!  momentary:  IDLE ──press──▶ PRESSED ──release──▶ SHORT ──press──▶ WAIT
//!                                 └──held──▶ LONG ──release──▶ IDLE
//!              WAIT ──release──▶ IDLE
//! ```

use log::{debug, warn};

use crate::drivers::switch::SwitchKind;
use crate::fsm::context::SwitchReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrewSwitchState {
    #[default]
    Idle,
    Pressed,
    ShortPressed,
    LongPressed,
    WaitForRelease,
}

#[derive(Debug, Clone, Default)]
pub struct BrewSwitch {
    state: BrewSwitchState,
    /// Set whenever the tracker sits in `Idle`; a cycle may only start
    /// from a press that followed a release.
    was_released: bool,
}

impl BrewSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BrewSwitchState {
        self.state
    }

    pub fn was_released(&self) -> bool {
        self.was_released
    }

    /// A short press that may start a new brew or backflush cycle.
    pub fn is_fresh_press(&self) -> bool {
        self.state == BrewSwitchState::ShortPressed && self.was_released
    }

    pub fn update(&mut self, reading: SwitchReading, kind: SwitchKind) {
        let next = match kind {
            SwitchKind::Toggle => self.next_toggle(reading.pressed),
            SwitchKind::Momentary => self.next_momentary(reading),
        };

        if next != self.state {
            debug!("brew switch: {:?} -> {:?}", self.state, next);
            self.state = next;
        }

        if self.state == BrewSwitchState::Idle {
            self.was_released = true;
        }
    }

    /// Called by a brew or backflush cycle when it reaches its end.
    ///
    /// A toggle switch still on parks in `WaitForRelease`, so the same
    /// switch position cannot start a second cycle.
    pub fn finish_cycle(&mut self) {
        self.was_released = false;
        if self.state == BrewSwitchState::ShortPressed {
            debug!("brew switch: cycle finished, waiting for release");
            self.state = BrewSwitchState::WaitForRelease;
        }
    }

    fn next_toggle(&self, pressed: bool) -> BrewSwitchState {
        use BrewSwitchState::*;
        match self.state {
            Idle if pressed => ShortPressed,
            Idle => Idle,
            ShortPressed | WaitForRelease if !pressed => Idle,
            ShortPressed => ShortPressed,
            WaitForRelease => WaitForRelease,
            Pressed | LongPressed => {
                warn!("brew switch: unexpected state {:?} for toggle switch", self.state);
                Idle
            }
        }
    }

    fn next_momentary(&self, reading: SwitchReading) -> BrewSwitchState {
        use BrewSwitchState::*;
        match self.state {
            Idle if reading.pressed => Pressed,
            Idle => Idle,
            Pressed if !reading.pressed => ShortPressed,
            Pressed if reading.long_press => LongPressed,
            Pressed => Pressed,
            // second press while a cycle runs is the stop request
            ShortPressed if reading.pressed => WaitForRelease,
            ShortPressed => ShortPressed,
            LongPressed | WaitForRelease if !reading.pressed => Idle,
            LongPressed => LongPressed,
            WaitForRelease => WaitForRelease,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UP: SwitchReading = SwitchReading { pressed: false, long_press: false };
    const DOWN: SwitchReading = SwitchReading { pressed: true, long_press: false };
    const HELD: SwitchReading = SwitchReading { pressed: true, long_press: true };

    #[test]
    fn toggle_on_is_short_press() {
        let mut sw = BrewSwitch::new();
        sw.update(UP, SwitchKind::Toggle);
        sw.update(DOWN, SwitchKind::Toggle);
        assert_eq!(sw.state(), BrewSwitchState::ShortPressed);
        assert!(sw.is_fresh_press());
        sw.update(UP, SwitchKind::Toggle);
        assert_eq!(sw.state(), BrewSwitchState::Idle);
    }

    #[test]
    fn switch_on_at_boot_is_not_fresh() {
        let mut sw = BrewSwitch::new();
        sw.update(DOWN, SwitchKind::Toggle);
        assert_eq!(sw.state(), BrewSwitchState::ShortPressed);
        assert!(!sw.is_fresh_press());
    }

    #[test]
    fn finish_cycle_parks_toggle_until_release() {
        let mut sw = BrewSwitch::new();
        sw.update(UP, SwitchKind::Toggle);
        sw.update(DOWN, SwitchKind::Toggle);
        sw.finish_cycle();
        assert_eq!(sw.state(), BrewSwitchState::WaitForRelease);
        sw.update(DOWN, SwitchKind::Toggle);
        assert_eq!(sw.state(), BrewSwitchState::WaitForRelease);
        assert!(!sw.was_released());
        sw.update(UP, SwitchKind::Toggle);
        assert_eq!(sw.state(), BrewSwitchState::Idle);
        assert!(sw.was_released());
    }

    #[test]
    fn momentary_short_press() {
        let mut sw = BrewSwitch::new();
        sw.update(UP, SwitchKind::Momentary);
        sw.update(DOWN, SwitchKind::Momentary);
        assert_eq!(sw.state(), BrewSwitchState::Pressed);
        sw.update(UP, SwitchKind::Momentary);
        assert_eq!(sw.state(), BrewSwitchState::ShortPressed);
        assert!(sw.is_fresh_press());
    }

    #[test]
    fn momentary_second_press_requests_stop() {
        let mut sw = BrewSwitch::new();
        for r in [UP, DOWN, UP, DOWN] {
            sw.update(r, SwitchKind::Momentary);
        }
        assert_eq!(sw.state(), BrewSwitchState::WaitForRelease);
        sw.update(UP, SwitchKind::Momentary);
        assert_eq!(sw.state(), BrewSwitchState::Idle);
    }

    #[test]
    fn momentary_long_press() {
        let mut sw = BrewSwitch::new();
        for r in [UP, DOWN, HELD] {
            sw.update(r, SwitchKind::Momentary);
        }
        assert_eq!(sw.state(), BrewSwitchState::LongPressed);
        sw.update(HELD, SwitchKind::Momentary);
        assert_eq!(sw.state(), BrewSwitchState::LongPressed);
        sw.update(UP, SwitchKind::Momentary);
        assert_eq!(sw.state(), BrewSwitchState::Idle);
    }

    #[test]
    fn kind_change_resets_momentary_only_states() {
        let mut sw = BrewSwitch::new();
        sw.update(DOWN, SwitchKind::Momentary);
        assert_eq!(sw.state(), BrewSwitchState::Pressed);
        sw.update(DOWN, SwitchKind::Toggle);
        assert_eq!(sw.state(), BrewSwitchState::Idle);
    }
}
