//! Inbound commands to the application service.
//!
//! These are the only way the outside world (display, MQTT, web UI) changes
//! machine state.  The [`MachineService`](super::service::MachineService)
//! applies them on the loop thread, either as runtime flags or as parameter
//! writes that the next tick picks up.

use crate::control::pump::PumpMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Arm or cancel a backflush run.
    SetBackflush(bool),

    /// Steam mode from the UI (a fitted steam switch overrides it).
    SetSteam(bool),

    /// Enable or disable the heater PID.  Persisted as `pid.enabled`.
    SetPidEnabled(bool),

    /// Select a brew profile by catalog index.
    SelectProfile(usize),

    /// Change the pump control mode.
    SetPumpMode(PumpMode),
}
