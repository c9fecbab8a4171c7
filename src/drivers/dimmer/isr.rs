//! Zero-cross and phase-timer interrupt logic.
//!
//! The decision functions are pure over [`DimmerShared`] and return the
//! action the interrupt glue must perform, so the firing pattern is unit
//! testable on the host.  Only the `*_from_isr` entry points touch pins
//! and timers.

use core::sync::atomic::Ordering;

use super::{DimmerMethod, DimmerShared};

/// Zero crossings closer than this to the last accepted one are glitches.
pub const PSM_MIN_INTERVAL_MS: u32 = 15;
/// Gate pulse width once the phase delay has elapsed.
pub const PULSE_WIDTH_US: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroCrossAction {
    /// Glitch, leave the output alone.
    Ignore,
    /// Drive the gate to this level for the coming half-cycle.
    Output(bool),
    /// Arm the one-shot timer for the phase delay.
    ArmTimer(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Drive the gate high and re-arm for the pulse width.
    FireAndArm(u32),
    /// Pulse over, drive the gate low.
    Release,
}

/// Handle one rising edge of the zero-cross detector.
pub fn on_zero_cross(shared: &DimmerShared, now_us: u64) -> ZeroCrossAction {
    shared.record_crossing(now_us as u32);

    let on = shared.on.load(Ordering::Acquire);
    let power = shared.power.load(Ordering::Relaxed);

    match shared.method() {
        DimmerMethod::Psm => {
            let now_ms = (now_us / 1_000) as u32;
            let last = shared.last_zero_cross_ms.load(Ordering::Relaxed);
            if now_ms.wrapping_sub(last) < PSM_MIN_INTERVAL_MS {
                return ZeroCrossAction::Ignore;
            }
            shared.last_zero_cross_ms.store(now_ms, Ordering::Relaxed);

            if !on || power == 0 {
                return ZeroCrossAction::Output(false);
            }
            let acc = shared.psm_accumulator.load(Ordering::Relaxed) + u32::from(power);
            if acc >= 100 {
                shared.psm_accumulator.store(acc - 100, Ordering::Relaxed);
                ZeroCrossAction::Output(true)
            } else {
                shared.psm_accumulator.store(acc, Ordering::Relaxed);
                ZeroCrossAction::Output(false)
            }
        }
        DimmerMethod::Phase => {
            if !on || power == 0 {
                shared.pulse_active.store(false, Ordering::Relaxed);
                return ZeroCrossAction::Output(false);
            }
            shared.pulse_active.store(false, Ordering::Relaxed);
            ZeroCrossAction::ArmTimer(shared.delay_us.load(Ordering::Relaxed))
        }
    }
}

/// Handle expiry of the phase one-shot timer.
pub fn on_timer_expiry(shared: &DimmerShared) -> TimerAction {
    if shared.pulse_active.swap(false, Ordering::AcqRel) {
        TimerAction::Release
    } else if shared.on.load(Ordering::Acquire) {
        shared.pulse_active.store(true, Ordering::Relaxed);
        TimerAction::FireAndArm(PULSE_WIDTH_US)
    } else {
        TimerAction::Release
    }
}

#[cfg(target_os = "espidf")]
pub fn zero_cross_from_isr(now_us: u64) {
    use crate::drivers::{hw_init, hw_timer};
    use crate::pins;

    match on_zero_cross(&super::DIMMER, now_us) {
        ZeroCrossAction::Ignore => {}
        ZeroCrossAction::Output(level) => hw_init::gpio_write(pins::PUMP_GPIO.into(), level),
        ZeroCrossAction::ArmTimer(delay) => hw_timer::arm_dimmer_timer(delay),
    }
}

#[cfg(target_os = "espidf")]
pub fn phase_timer_from_isr() {
    use crate::drivers::{hw_init, hw_timer};
    use crate::pins;

    match on_timer_expiry(&super::DIMMER) {
        TimerAction::FireAndArm(width) => {
            hw_init::gpio_write(pins::PUMP_GPIO.into(), true);
            hw_timer::arm_dimmer_timer(width);
        }
        TimerAction::Release => hw_init::gpio_write(pins::PUMP_GPIO.into(), false),
    }
}
