//! Outbound application events.
//!
//! The [`MachineService`](super::service::MachineService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them: log to serial, publish over
//! MQTT, refresh the display.

use crate::control::pump::PumpMode;
use crate::fsm::MachineState;
use crate::modes::backflush::BackflushState;
use crate::modes::brew::{BrewState, LastShot};
use crate::modes::hot_water::HotWaterState;
use crate::modes::manual_flush::FlushState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries the initial state).
    Started(MachineState),

    /// The supervisor transitioned between states.
    StateChanged { from: MachineState, to: MachineState },

    /// A shot reached Finished.
    ShotFinished(LastShot),

    /// A backflush run ended after `cycles` completed fill/flush pairs.
    BackflushFinished { cycles: u32 },

    /// The running brew profile moved to phase `index`.
    PhaseChanged { index: usize },

    /// The running brew profile exited its last phase.
    ProfileCompleted,

    /// Periodic status snapshot.
    Telemetry(MachineStatus),
}

/// Read-only view of the machine for displays and telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineStatus {
    pub state: MachineState,

    pub brew: BrewState,
    pub brew_ms: u64,
    pub shot_weight_g: f32,
    pub flush: FlushState,
    pub flush_ms: u64,
    pub backflush: BackflushState,
    pub backflush_cycle: u32,
    pub backflush_ms: u64,
    pub hot_water: HotWaterState,

    pub pump_mode: PumpMode,
    pub profile_phase: usize,
    pub pump_power: u8,

    pub pressure_bar: f32,
    pub flow_ml_s: f32,
    pub weight_g: f32,
    pub temperature_c: f32,
    pub heater_output_ms: u32,

    pub emergency_stop: bool,
    pub standby_remaining_ms: u64,
}
