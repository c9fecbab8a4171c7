//! Debounced physical switch with momentary long-press detection.
//!
//! A raw level change restarts the debounce timer; the logical state only
//! follows once the raw level has been stable for the whole window.  Reads
//! are polled from the control loop, there is no interrupt.

use embedded_hal::digital::InputPin;

pub const DEFAULT_DEBOUNCE_MS: u64 = 20;
pub const DEFAULT_LONG_PRESS_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    /// Latching rocker: the level is the command.
    Toggle,
    /// Spring-return push button.
    Momentary,
}

impl SwitchKind {
    pub fn from_index(i: i32) -> Self {
        if i == 1 { Self::Momentary } else { Self::Toggle }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchMode {
    NormallyOpen,
    NormallyClosed,
}

impl SwitchMode {
    pub fn from_index(i: i32) -> Self {
        if i == 1 { Self::NormallyClosed } else { Self::NormallyOpen }
    }
}

pub struct Switch<P> {
    pin: P,
    kind: SwitchKind,
    mode: SwitchMode,
    debounce_ms: u64,
    long_press_ms: u64,
    last_raw: bool,
    last_change_ms: u64,
    state: bool,
    press_start_ms: u64,
    long_press: bool,
}

impl<P: InputPin> Switch<P> {
    pub fn new(pin: P, kind: SwitchKind, mode: SwitchMode) -> Self {
        Self {
            pin,
            kind,
            mode,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            long_press_ms: DEFAULT_LONG_PRESS_MS,
            last_raw: mode == SwitchMode::NormallyClosed,
            last_change_ms: 0,
            state: false,
            press_start_ms: 0,
            long_press: false,
        }
    }

    pub fn with_timing(mut self, debounce_ms: u64, long_press_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self.long_press_ms = long_press_ms;
        self
    }

    pub fn kind(&self) -> SwitchKind {
        self.kind
    }

    /// Debounced logical state.  A failed read keeps the last state.
    pub fn is_pressed(&mut self, now_ms: u64) -> bool {
        let Ok(raw) = self.pin.is_high() else {
            return self.state;
        };

        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_change_ms = now_ms;
        }

        let logical = raw ^ (self.mode == SwitchMode::NormallyClosed);
        if now_ms.saturating_sub(self.last_change_ms) >= self.debounce_ms && logical != self.state {
            self.state = logical;
            if logical {
                self.press_start_ms = now_ms;
            } else {
                self.long_press = false;
            }
        }

        if self.kind == SwitchKind::Momentary
            && self.state
            && now_ms.saturating_sub(self.press_start_ms) >= self.long_press_ms
        {
            self.long_press = true;
        }

        self.state
    }

    /// Held continuously for the long-press threshold.  Always false for a
    /// toggle switch.
    pub fn long_press_detected(&mut self, now_ms: u64) -> bool {
        if self.kind == SwitchKind::Toggle {
            return false;
        }
        self.is_pressed(now_ms);
        self.long_press
    }
}
