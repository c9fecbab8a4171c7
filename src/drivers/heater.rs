//! Heater relay time-proportioning window.
//!
//! The temperature PID produces an on-time in milliseconds per 1000 ms
//! window.  A 10 ms periodic timer walks a counter through the window and
//! switches the solid-state relay; the PID output is the only value the
//! main loop shares with it.

use core::sync::atomic::{AtomicU32, Ordering};

pub const WINDOW_MS: u32 = 1_000;
pub const TICK_MS: u32 = 10;

pub struct HeaterWindow {
    output_ms: AtomicU32,
    counter_ms: AtomicU32,
}

/// The board's heater window, ticked from `hw_timer`.
pub static HEATER: HeaterWindow = HeaterWindow::new();

impl HeaterWindow {
    pub const fn new() -> Self {
        Self {
            output_ms: AtomicU32::new(0),
            counter_ms: AtomicU32::new(0),
        }
    }

    /// Main loop: publish the PID output, clamped to the window.
    pub fn set_output(&self, output_ms: u32) {
        self.output_ms.store(output_ms.min(WINDOW_MS), Ordering::Relaxed);
    }

    pub fn output(&self) -> u32 {
        self.output_ms.load(Ordering::Relaxed)
    }

    /// Timer context: relay level for this 10 ms slot.
    pub fn on_timer_tick(&self) -> bool {
        let counter = self.counter_ms.load(Ordering::Relaxed);
        let on = self.output_ms.load(Ordering::Relaxed) > counter;
        let next = counter + TICK_MS;
        self.counter_ms
            .store(if next >= WINDOW_MS { 0 } else { next }, Ordering::Relaxed);
        on
    }
}

impl Default for HeaterWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
pub fn heater_tick_from_timer() {
    let on = HEATER.on_timer_tick();
    crate::drivers::hw_init::gpio_write(crate::pins::HEATER_RELAY_GPIO.into(), on);
}
