//! Hardware timers using ESP-IDF's esp_timer API.
//!
//! - 10 ms periodic heater window tick
//! - one-shot dimmer phase timer, re-armed from the zero-cross ISR
//!
//! The dimmer timer uses ISR dispatch so the gate pulse is not delayed by
//! the esp_timer task.  On simulation targets nothing is started; tests
//! drive `HeaterWindow` and the dimmer ISR logic directly.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::drivers::hw_init::HwInitError;

#[cfg(target_os = "espidf")]
static mut HEATER_TIMER: esp_timer_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut DIMMER_TIMER: esp_timer_handle_t = core::ptr::null_mut();

/// SAFETY: DIMMER_TIMER is written once in `start_timers()` before the
/// zero-cross interrupt is enabled.
#[cfg(target_os = "espidf")]
unsafe fn dimmer_timer() -> esp_timer_handle_t { unsafe { DIMMER_TIMER } }

/// SAFETY: Same invariants as `dimmer_timer()`.
#[cfg(target_os = "espidf")]
unsafe fn heater_timer() -> esp_timer_handle_t { unsafe { HEATER_TIMER } }

#[cfg(target_os = "espidf")]
unsafe extern "C" fn heater_tick_cb(_arg: *mut core::ffi::c_void) {
    crate::drivers::heater::heater_tick_from_timer();
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn dimmer_phase_cb(_arg: *mut core::ffi::c_void) {
    crate::drivers::dimmer::isr::phase_timer_from_isr();
}

/// Start the heater tick and create the dimmer one-shot timer.
#[cfg(target_os = "espidf")]
pub fn start_timers() -> Result<(), HwInitError> {
    // SAFETY: HEATER_TIMER and DIMMER_TIMER are written here once at boot
    // from the main task before any callback can fire.
    unsafe {
        let heater_args = esp_timer_create_args_t {
            callback: Some(heater_tick_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: c"heater".as_ptr(),
            skip_unhandled_events: true,
        };
        let ret = esp_timer_create(&heater_args, &raw mut HEATER_TIMER);
        if ret != ESP_OK { return Err(HwInitError::TimerFailed(ret)); }
        let ret = esp_timer_start_periodic(HEATER_TIMER, u64::from(crate::drivers::heater::TICK_MS) * 1_000);
        if ret != ESP_OK { return Err(HwInitError::TimerFailed(ret)); }

        let dimmer_args = esp_timer_create_args_t {
            callback: Some(dimmer_phase_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_ISR,
            name: c"dimmer".as_ptr(),
            skip_unhandled_events: false,
        };
        let ret = esp_timer_create(&dimmer_args, &raw mut DIMMER_TIMER);
        if ret != ESP_OK { return Err(HwInitError::TimerFailed(ret)); }

        info!("hw_timer: heater@100Hz started, dimmer one-shot ready");
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn start_timers() -> Result<(), HwInitError> {
    log::info!("hw_timer(sim): timers not started");
    Ok(())
}

/// (Re)arm the dimmer phase timer.  Called from ISR context.
#[cfg(target_os = "espidf")]
pub fn arm_dimmer_timer(delay_us: u32) {
    // SAFETY: dimmer_timer() is a valid handle once start_timers() has
    // returned; stop on an idle timer returns an error we ignore.
    unsafe {
        let t = dimmer_timer();
        if t.is_null() { return; }
        esp_timer_stop(t);
        esp_timer_start_once(t, u64::from(delay_us));
    }
}

/// Stop all hardware timers.
#[cfg(target_os = "espidf")]
pub fn stop_timers() {
    // SAFETY: handles are valid if start_timers() succeeded; null-check
    // covers a partial start.
    unsafe {
        let ht = heater_timer();
        if !ht.is_null() { esp_timer_stop(ht); }
        let dt = dimmer_timer();
        if !dt.is_null() { esp_timer_stop(dt); }
    }
    crate::drivers::hw_init::gpio_write(crate::pins::HEATER_RELAY_GPIO.into(), false);
}

#[cfg(not(target_os = "espidf"))]
pub fn stop_timers() {
    log::info!("hw_timer(sim): timers stopped");
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn sim_timers_start_and_stop_cleanly() {
        assert!(start_timers().is_ok());
        stop_timers();
        // stopping twice, as a failed boot after a partial start would
        stop_timers();
    }
}
