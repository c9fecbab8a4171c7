//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MachineService (domain)
//! ```
//!
//! Driven adapters (sensors, actuators, event sinks, parameter storage)
//! implement these traits.  The [`MachineService`](super::service::MachineService)
//! consumes them via generics, so the control core never touches hardware
//! directly.

use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::drivers::dimmer::{DimmerMethod, FlowCalibration};
use crate::drivers::pump_control::PumpControlKind;
use crate::config::ParameterStore;
use crate::fsm::context::{SensorSnapshot, SwitchReadings};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain sensor data.
pub trait SensorPort {
    /// Read every numeric sensor and return a unified snapshot.
    fn read_all(&mut self, now_ms: u64) -> SensorSnapshot;

    /// Debounced switch levels.  A switch that is not fitted reads `None`.
    fn read_switches(&mut self, now_ms: u64) -> SwitchReadings;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to command actuators.
///
/// There is exactly one pump path and one valve; these calls are the only
/// way the core energises them.
pub trait ActuatorPort {
    fn set_valve(&mut self, on: bool);

    fn valve_state(&self) -> bool;

    fn set_pump(&mut self, on: bool);

    fn pump_state(&self) -> bool;

    /// Which pump variant is fitted (plain relay or zero-cross dimmer).
    fn pump_kind(&self) -> PumpControlKind;

    /// Dimmer power 0–100.  No-op on a relay pump.
    fn set_pump_power(&mut self, power: u8);

    /// Feed the measured pressure to the dimmer's power scaler.
    fn set_pump_pressure(&mut self, bar: f32);

    /// Switch the dimmer between burst-fire and phase-cut firing.
    fn set_dimmer_method(&mut self, method: DimmerMethod);

    /// Modelled pump flow (mL/s) at the given pressure.
    fn estimate_flow(&self, pressure_bar: f32, cal: &FlowCalibration) -> f32;

    /// Heater PID output in milliseconds of the 1 s relay window.
    fn set_heater_output(&mut self, output_ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT,
/// display, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ parameter store)
// ───────────────────────────────────────────────────────────────

/// Typed access to tunable parameters keyed by dotted paths such as
/// `brew.by_time.target_time`.
///
/// The control core reads parameters every tick and never caches them, so
/// a `set` takes effect on the next control tick.  Range validation is the
/// store's job; values returned by `get` are trusted.
pub trait ConfigPort {
    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConfigError>;

    fn set<T: Serialize>(&mut self, path: &str, value: T) -> Result<(), ConfigError>;

    /// Read `path`, falling back to `default` (with a warning) when the key
    /// is missing or has the wrong type.
    fn get_or<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        match self.get(path) {
            Ok(value) => value,
            Err(e) => {
                warn!("config '{}': {}, using default", path, e);
                default
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: parameter tree ↔ flash)
// ───────────────────────────────────────────────────────────────

/// Persistence for the whole parameter tree.
pub trait StoragePort {
    /// Load the stored tree.  Nothing stored yet is not an error; the
    /// factory defaults come back instead.
    fn load(&self) -> Result<ParameterStore, StorageError>;

    fn save(&mut self, params: &ParameterStore) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the task bodies)
// ───────────────────────────────────────────────────────────────

/// Callback trait the [`CooperativeScheduler`](crate::scheduler::CooperativeScheduler)
/// invokes for each task it decides to run.
pub trait TaskDelegate {
    /// Run the task named `label` and report how long it took, in µs.
    fn run(&mut self, label: &'static str) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No parameter at that path.
    NotFound,
    /// The stored value cannot be converted to the requested type.
    TypeMismatch,
    /// Path is empty, has an empty segment, or crosses a non-object value.
    InvalidPath,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "parameter not found"),
            Self::TypeMismatch => write!(f, "type mismatch"),
            Self::InvalidPath => write!(f, "invalid parameter path"),
        }
    }
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The flash driver reported an error code.
    Io(i32),
    /// Stored bytes are not a valid parameter tree.
    Corrupted,
    /// Serialized tree exceeds the blob limit.
    TooLarge,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(code) => write!(f, "storage I/O error {code}"),
            Self::Corrupted => write!(f, "stored parameters corrupted"),
            Self::TooLarge => write!(f, "parameter blob too large"),
        }
    }
}
