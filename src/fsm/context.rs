//! Shared mutable context threaded through every supervisor handler.
//!
//! `MachineContext` is the blackboard state handlers read from and write
//! to: the conditioned sensor snapshot, switch readings, this tick's
//! settings, the runtime flags, the sub-machines and the actuator
//! commands they produce.

use crate::config::Settings;
use crate::modes::backflush::{BackflushContext, BackflushInputs};
use crate::modes::brew::{BrewContext, BrewInputs};
use crate::modes::brew_switch::BrewSwitch;
use crate::modes::hot_water::{HotWaterContext, HotWaterInputs};
use crate::modes::manual_flush::ManualFlush;
use crate::standby::StandbyTimer;

// ---------------------------------------------------------------------------
// Sensor snapshot (read-only to state handlers; written by the service)
// ---------------------------------------------------------------------------

/// A point-in-time snapshot of every sensor the core uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSnapshot {
    /// Boiler temperature (°C).
    pub temperature_c: f32,
    /// The temperature sensor reports a fault.
    pub temp_sensor_error: bool,
    /// Brew pressure (bar).  Raw from the sensor port, filtered by the
    /// service before handlers see it.
    pub pressure_bar: f32,
    /// Scale reading (g).
    pub weight_g: f32,
    pub scale_connected: bool,
    /// Tank level.  Raw from the sensor port, debounced by the service.
    pub water_tank_full: bool,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            temperature_c: 0.0,
            temp_sensor_error: false,
            pressure_bar: 0.0,
            weight_g: 0.0,
            scale_connected: false,
            water_tank_full: true,
        }
    }
}

/// Debounced state of one switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitchReading {
    pub pressed: bool,
    /// Momentary switch held past the long-press threshold.
    pub long_press: bool,
}

/// Switch levels for one tick.  `None` means the switch is not fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitchReadings {
    pub brew: Option<SwitchReading>,
    pub hot_water: Option<SwitchReading>,
    pub steam: Option<bool>,
}

// ---------------------------------------------------------------------------
// Actuator commands (written by sub-machines; consumed by the service)
// ---------------------------------------------------------------------------

/// Valve and pump requests.  The service applies them after the safety
/// pass has masked anything the current machine state does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActuatorCommands {
    pub valve: bool,
    pub pump: bool,
}

impl ActuatorCommands {
    /// Both actuators off.
    pub fn all_off() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Runtime flags
// ---------------------------------------------------------------------------

/// Flags set from outside the supervisor: commands, switches, the
/// over-temperature latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineFlags {
    pub backflush_on: bool,
    pub steam_on: bool,
    /// Heater PID runtime state; cleared by standby.
    pub pid_on: bool,
    pub hot_water_on: bool,
    pub emergency_stop: bool,
}

impl Default for MachineFlags {
    fn default() -> Self {
        Self {
            backflush_on: false,
            steam_on: false,
            pid_on: true,
            hot_water_on: false,
            emergency_stop: false,
        }
    }
}

// ---------------------------------------------------------------------------
// MachineContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
#[derive(Debug, Clone)]
pub struct MachineContext {
    // -- Timing --
    pub now_ms: u64,
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    pub total_ticks: u64,

    // -- Inputs --
    pub sensors: SensorSnapshot,
    pub switches: SwitchReadings,
    /// Parameters as read from the store this tick.
    pub settings: Settings,
    pub flags: MachineFlags,

    // -- Outputs --
    pub commands: ActuatorCommands,

    // -- Sub-machines --
    pub brew_switch: BrewSwitch,
    pub brew: BrewContext,
    pub flush: ManualFlush,
    pub backflush: BackflushContext,
    pub hot_water: HotWaterContext,
    pub standby: StandbyTimer,
}

impl MachineContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            now_ms: 0,
            ticks_in_state: 0,
            total_ticks: 0,
            sensors: SensorSnapshot::default(),
            switches: SwitchReadings::default(),
            settings,
            flags: MachineFlags::default(),
            commands: ActuatorCommands::all_off(),
            brew_switch: BrewSwitch::new(),
            brew: BrewContext::new(),
            flush: ManualFlush::new(),
            backflush: BackflushContext::new(),
            hot_water: HotWaterContext::new(),
            standby: StandbyTimer::new(),
        }
    }

    /// Brew switch fitted and enabled in config.
    pub fn brew_switch_enabled(&self) -> bool {
        self.settings.switches.brew.enabled && self.switches.brew.is_some()
    }

    pub fn scale_ready(&self) -> bool {
        self.settings.sensors.scale && self.sensors.scale_connected
    }

    /// Brew, manual flush or backflush in progress.
    pub fn brew_busy(&self) -> bool {
        self.brew.is_active() || self.flush.is_running() || self.backflush.state().is_active()
    }

    /// Number of water-path sub-machines currently running.  Never above 1.
    pub fn running_count(&self) -> usize {
        [
            self.brew.is_active(),
            self.flush.is_running(),
            self.backflush.state().is_active(),
            self.hot_water.is_running(),
        ]
        .iter()
        .filter(|&&b| b)
        .count()
    }

    pub fn standby_expired(&self) -> bool {
        self.settings.standby.enabled && self.standby.expired()
    }

    pub fn reset_standby(&mut self) {
        self.standby.reset(self.now_ms, &self.settings.standby);
    }

    /// Conditions that stop a hot water draw.
    pub fn hot_water_stop(&self) -> bool {
        !self.sensors.water_tank_full
            || self.flags.emergency_stop
            || self.sensors.temp_sensor_error
            || !self.flags.pid_on
    }

    // -- Sub-machine polls --

    pub fn run_brew(&mut self) -> bool {
        let inputs = BrewInputs {
            now_ms: self.now_ms,
            switch_enabled: self.brew_switch_enabled(),
            backflush_on: self.flags.backflush_on,
            weight_g: self.sensors.weight_g,
            scale_ready: self.scale_ready(),
        };
        self.brew
            .run(&inputs, &self.settings.brew, &mut self.brew_switch, &mut self.commands)
    }

    pub fn run_flush(&mut self) -> bool {
        let enabled = self.brew_switch_enabled();
        let brew_idle = !self.brew.is_active();
        self.flush
            .run(self.now_ms, enabled, brew_idle, &self.brew_switch, &mut self.commands)
    }

    pub fn run_backflush(&mut self) -> bool {
        let inputs = BackflushInputs {
            now_ms: self.now_ms,
            switch_enabled: self.brew_switch_enabled(),
            backflush_on: self.flags.backflush_on,
            brew_idle: !self.brew.is_active(),
        };
        self.backflush
            .run(&inputs, &self.settings.backflush, &mut self.brew_switch, &mut self.commands)
    }

    pub fn run_hot_water(&mut self) -> bool {
        let inputs = HotWaterInputs {
            hot_water_on: self.flags.hot_water_on,
            stop_condition: self.hot_water_stop(),
            brew_busy: self.brew_busy(),
        };
        self.hot_water.run(&inputs, &mut self.commands)
    }
}
