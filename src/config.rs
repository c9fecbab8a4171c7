//! Parameter store and typed per-tick settings views.
//!
//! Every tunable lives in one JSON tree addressed by dotted paths
//! (`brew.pre_infusion.time`, `dimmer.psm.flow.kp`, …).  The control core
//! reads it through [`ConfigPort`] at the start of every tick via the
//! `*Settings::load` helpers below, so edits land on the next tick without
//! a restart.  Persistence and range validation belong to whoever owns
//! the store.

use serde::Serialize;
use serde::de::{Deserialize, DeserializeOwned};
use serde_json::{Map, Value, json};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::control::pid::PidGains;
use crate::control::pump::PumpMode;
use crate::drivers::dimmer::{DimmerMethod, FlowCalibration};
use crate::drivers::switch::{SwitchKind, SwitchMode};

// ═══════════════════════════════════════════════════════════════
//  Parameter paths
// ═══════════════════════════════════════════════════════════════

pub mod keys {
    pub const BREW_MODE: &str = "brew.mode";
    pub const BREW_BY_TIME_ENABLED: &str = "brew.by_time.enabled";
    pub const BREW_TARGET_TIME: &str = "brew.by_time.target_time";
    pub const BREW_BY_WEIGHT_ENABLED: &str = "brew.by_weight.enabled";
    pub const BREW_TARGET_WEIGHT: &str = "brew.by_weight.target_weight";
    pub const PREINFUSION_ENABLED: &str = "brew.pre_infusion.enabled";
    pub const PREINFUSION_TIME: &str = "brew.pre_infusion.time";
    pub const PREINFUSION_PAUSE: &str = "brew.pre_infusion.pause";
    pub const BREW_PID_DELAY: &str = "brew.pid_delay";

    pub const BACKFLUSH_CYCLES: &str = "backflush.cycles";
    pub const BACKFLUSH_FILL_TIME: &str = "backflush.fill_time";
    pub const BACKFLUSH_FLUSH_TIME: &str = "backflush.flush_time";

    pub const DIMMER_ENABLED: &str = "dimmer.enabled";
    pub const DIMMER_TYPE: &str = "dimmer.type";
    pub const DIMMER_MODE: &str = "dimmer.mode";
    pub const DIMMER_PROFILE: &str = "dimmer.profile";
    pub const DIMMER_I_MAX: &str = "dimmer.i_max";
    pub const SETPOINT_POWER: &str = "dimmer.setpoint.power";
    pub const SETPOINT_PRESSURE: &str = "dimmer.setpoint.pressure";
    pub const SETPOINT_FLOW: &str = "dimmer.setpoint.flow";
    pub const CALIBRATION_FLOW1: &str = "dimmer.calibration.flow_rate1";
    pub const CALIBRATION_FLOW2: &str = "dimmer.calibration.flow_rate2";
    pub const CALIBRATION_OPV: &str = "dimmer.calibration.opv_pressure";

    pub const SCALE_ENABLED: &str = "hardware.sensors.scale.enabled";
    pub const PRESSURE_SENSOR_ENABLED: &str = "hardware.sensors.pressure.enabled";
    pub const WATER_TANK_SENSOR_ENABLED: &str = "hardware.sensors.water_tank.enabled";

    pub const PID_ENABLED: &str = "pid.enabled";
    pub const PID_SETPOINT: &str = "pid.setpoint";
    pub const PID_STEAM_SETPOINT: &str = "pid.steam_setpoint";
    pub const PID_KP: &str = "pid.kp";
    pub const PID_TN: &str = "pid.tn";
    pub const PID_TV: &str = "pid.tv";
    pub const PID_I_MAX: &str = "pid.i_max";
    pub const PID_STEAM_KP: &str = "pid.steam_kp";

    pub const STANDBY_ENABLED: &str = "standby.enabled";
    pub const STANDBY_TIME: &str = "standby.time";

    /// Prefix for `hardware.switches.<name>.{enabled,type,mode}`.
    pub const SWITCHES: &str = "hardware.switches";
}

// ═══════════════════════════════════════════════════════════════
//  ParameterStore
// ═══════════════════════════════════════════════════════════════

/// In-memory parameter tree implementing [`ConfigPort`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterStore {
    root: Value,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::defaults()
    }
}

impl ParameterStore {
    /// Wrap an existing document (e.g. one loaded from flash).
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Parse a JSON document.  A non-object root is rejected.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(text).map_err(|_| ConfigError::TypeMismatch)?;
        if !root.is_object() {
            return Err(ConfigError::InvalidPath);
        }
        Ok(Self { root })
    }

    /// The factory parameter set.
    pub fn defaults() -> Self {
        Self::from_value(json!({
            "brew": {
                "mode": 1,
                "by_time": { "enabled": true, "target_time": 25.0 },
                "by_weight": { "enabled": false, "target_weight": 36.0 },
                "pre_infusion": { "enabled": true, "time": 2.0, "pause": 5.0 },
                "pid_delay": 10.0
            },
            "backflush": { "cycles": 5, "fill_time": 5.0, "flush_time": 10.0 },
            "dimmer": {
                "enabled": false,
                "type": 0,
                "mode": 0,
                "profile": 0,
                "i_max": 100.0,
                "setpoint": { "power": 100.0, "pressure": 9.0, "flow": 8.0 },
                "psm": {
                    "pressure": { "kp": 20.0, "ki": 10.0, "kd": 1.5 },
                    "flow": { "kp": 8.0, "ki": 30.0, "kd": 0.0 }
                },
                "phase": {
                    "pressure": { "kp": 10.0, "ki": 20.0, "kd": 1.0 },
                    "flow": { "kp": 2.0, "ki": 15.0, "kd": 0.0 }
                },
                "calibration": { "flow_rate1": 292.4, "flow_rate2": 124.4, "opv_pressure": 10.0 }
            },
            "hardware": {
                "switches": {
                    "brew": { "enabled": true, "type": 0, "mode": 0 },
                    "hot_water": { "enabled": false, "type": 0, "mode": 0 },
                    "steam": { "enabled": false, "type": 0, "mode": 0 },
                    "power": { "enabled": false, "type": 1, "mode": 0 }
                },
                "sensors": {
                    "scale": { "enabled": false },
                    "pressure": { "enabled": false },
                    "water_tank": { "enabled": false }
                }
            },
            "pid": {
                "enabled": true,
                "setpoint": 95.0,
                "steam_setpoint": 120.0,
                "kp": 62.0,
                "tn": 52.0,
                "tv": 11.5,
                "i_max": 55.0,
                "steam_kp": 150.0
            },
            "standby": { "enabled": false, "time": 35.0 }
        }))
    }

    /// The whole document, for persistence or a web/MQTT snapshot.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    fn lookup(&self, path: &str) -> Result<&Value, ConfigError> {
        validate_path(path)?;
        let mut node = &self.root;
        for segment in path.split('.') {
            node = match node {
                Value::Object(map) => map.get(segment).ok_or(ConfigError::NotFound)?,
                _ => return Err(ConfigError::InvalidPath),
            };
        }
        Ok(node)
    }
}

impl ConfigPort for ParameterStore {
    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConfigError> {
        let node = self.lookup(path)?;
        <T as Deserialize>::deserialize(node).map_err(|_| ConfigError::TypeMismatch)
    }

    fn set<T: Serialize>(&mut self, path: &str, value: T) -> Result<(), ConfigError> {
        validate_path(path)?;
        let value = serde_json::to_value(value).map_err(|_| ConfigError::TypeMismatch)?;

        let (parents, leaf) = match path.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, path),
        };

        let mut node = &mut self.root;
        for segment in parents.into_iter().flat_map(|p| p.split('.')) {
            node = match node {
                Value::Object(map) => map
                    .entry(segment)
                    .or_insert_with(|| Value::Object(Map::new())),
                _ => return Err(ConfigError::InvalidPath),
            };
        }

        match node {
            Value::Object(map) => {
                map.insert(leaf.to_owned(), value);
                Ok(())
            }
            _ => Err(ConfigError::InvalidPath),
        }
    }
}

fn validate_path(path: &str) -> Result<(), ConfigError> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(ConfigError::InvalidPath);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
//  Typed settings views (re-read every tick)
// ═══════════════════════════════════════════════════════════════

/// Brew sequencing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrewSettings {
    /// `false` when the pump and valve are wired straight to the brew
    /// switch contactor and the firmware only times the shot.
    pub controlled: bool,
    pub by_time: bool,
    pub target_time_s: f32,
    pub by_weight: bool,
    pub target_weight_g: f32,
    pub preinfusion: bool,
    pub preinfusion_s: f32,
    pub pause_s: f32,
    /// Heater hold-off at the start of a shot.
    pub pid_delay_s: f32,
}

impl Default for BrewSettings {
    fn default() -> Self {
        Self {
            controlled: true,
            by_time: true,
            target_time_s: 25.0,
            by_weight: false,
            target_weight_g: 36.0,
            preinfusion: true,
            preinfusion_s: 2.0,
            pause_s: 5.0,
            pid_delay_s: 10.0,
        }
    }
}

impl BrewSettings {
    pub fn load(cfg: &impl ConfigPort) -> Self {
        let d = Self::default();
        Self {
            controlled: cfg.get_or::<i32>(keys::BREW_MODE, 1) != 0,
            by_time: cfg.get_or(keys::BREW_BY_TIME_ENABLED, d.by_time),
            target_time_s: cfg.get_or(keys::BREW_TARGET_TIME, d.target_time_s),
            by_weight: cfg.get_or(keys::BREW_BY_WEIGHT_ENABLED, d.by_weight),
            target_weight_g: cfg.get_or(keys::BREW_TARGET_WEIGHT, d.target_weight_g),
            preinfusion: cfg.get_or(keys::PREINFUSION_ENABLED, d.preinfusion),
            preinfusion_s: cfg.get_or(keys::PREINFUSION_TIME, d.preinfusion_s),
            pause_s: cfg.get_or(keys::PREINFUSION_PAUSE, d.pause_s),
            pid_delay_s: cfg.get_or(keys::BREW_PID_DELAY, d.pid_delay_s),
        }
    }

    /// Pre-infusion and pause durations in ms; both zero when disabled.
    pub fn preinfusion_ms(&self) -> (u64, u64) {
        if self.preinfusion {
            (secs_to_ms(self.preinfusion_s), secs_to_ms(self.pause_s))
        } else {
            (0, 0)
        }
    }

    /// Total shot length for brew-by-time, including pre-infusion and
    /// pause.  `None` when stop-by-time is off or the target is zero.
    pub fn total_target_ms(&self) -> Option<u64> {
        if !self.controlled || !self.by_time || self.target_time_s <= 0.0 {
            return None;
        }
        let (pre, pause) = self.preinfusion_ms();
        Some(secs_to_ms(self.target_time_s) + pre + pause)
    }
}

/// Backflush cleaning cycle parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackflushSettings {
    pub cycles: i32,
    pub fill_s: f32,
    pub flush_s: f32,
}

impl Default for BackflushSettings {
    fn default() -> Self {
        Self {
            cycles: 5,
            fill_s: 5.0,
            flush_s: 10.0,
        }
    }
}

impl BackflushSettings {
    pub fn load(cfg: &impl ConfigPort) -> Self {
        let d = Self::default();
        Self {
            cycles: cfg.get_or(keys::BACKFLUSH_CYCLES, d.cycles),
            fill_s: cfg.get_or(keys::BACKFLUSH_FILL_TIME, d.fill_s),
            flush_s: cfg.get_or(keys::BACKFLUSH_FLUSH_TIME, d.flush_s),
        }
    }
}

/// Wiring of one physical switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchConfig {
    pub enabled: bool,
    pub kind: SwitchKind,
    pub mode: SwitchMode,
}

impl SwitchConfig {
    pub fn load(cfg: &impl ConfigPort, name: &str, default_enabled: bool) -> Self {
        let path = |leaf: &str| format!("{}.{}.{}", keys::SWITCHES, name, leaf);
        Self {
            enabled: cfg.get_or(&path("enabled"), default_enabled),
            kind: SwitchKind::from_index(cfg.get_or(&path("type"), 0)),
            mode: SwitchMode::from_index(cfg.get_or(&path("mode"), 0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchSettings {
    pub brew: SwitchConfig,
    pub hot_water: SwitchConfig,
    pub steam: SwitchConfig,
}

impl SwitchSettings {
    pub fn load(cfg: &impl ConfigPort) -> Self {
        Self {
            brew: SwitchConfig::load(cfg, "brew", true),
            hot_water: SwitchConfig::load(cfg, "hot_water", false),
            steam: SwitchConfig::load(cfg, "steam", false),
        }
    }
}

/// Which optional sensors are fitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorSettings {
    pub scale: bool,
    pub pressure: bool,
    pub water_tank: bool,
}

impl SensorSettings {
    pub fn load(cfg: &impl ConfigPort) -> Self {
        Self {
            scale: cfg.get_or(keys::SCALE_ENABLED, false),
            pressure: cfg.get_or(keys::PRESSURE_SENSOR_ENABLED, false),
            water_tank: cfg.get_or(keys::WATER_TANK_SENSOR_ENABLED, false),
        }
    }
}

/// Pump dimmer control parameters.  Gains are already selected for the
/// active dimmer method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpSettings {
    pub enabled: bool,
    pub method: DimmerMethod,
    pub mode: PumpMode,
    pub profile: usize,
    pub i_max: f32,
    pub power_setpoint: f32,
    pub pressure_setpoint: f32,
    pub flow_setpoint: f32,
    pub pressure_gains: PidGains,
    pub flow_gains: PidGains,
    pub calibration: FlowCalibration,
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            method: DimmerMethod::Psm,
            mode: PumpMode::Power,
            profile: 0,
            i_max: 100.0,
            power_setpoint: 100.0,
            pressure_setpoint: 9.0,
            flow_setpoint: 8.0,
            pressure_gains: PidGains::new(20.0, 10.0, 1.5),
            flow_gains: PidGains::new(8.0, 30.0, 0.0),
            calibration: FlowCalibration::default(),
        }
    }
}

impl PumpSettings {
    pub fn load(cfg: &impl ConfigPort) -> Self {
        let d = Self::default();
        let method = DimmerMethod::from_index(cfg.get_or(keys::DIMMER_TYPE, 0));
        let prefix = match method {
            DimmerMethod::Psm => "dimmer.psm",
            DimmerMethod::Phase => "dimmer.phase",
        };
        let gains = |which: &str, fallback: PidGains| PidGains {
            kp: cfg.get_or(&format!("{prefix}.{which}.kp"), fallback.kp),
            ki: cfg.get_or(&format!("{prefix}.{which}.ki"), fallback.ki),
            kd: cfg.get_or(&format!("{prefix}.{which}.kd"), fallback.kd),
        };
        let profile: i32 = cfg.get_or(keys::DIMMER_PROFILE, 0);

        Self {
            enabled: cfg.get_or(keys::DIMMER_ENABLED, d.enabled),
            method,
            mode: PumpMode::from_index(cfg.get_or(keys::DIMMER_MODE, 0)),
            profile: profile.max(0) as usize,
            i_max: cfg.get_or(keys::DIMMER_I_MAX, d.i_max),
            power_setpoint: cfg.get_or(keys::SETPOINT_POWER, d.power_setpoint),
            pressure_setpoint: cfg.get_or(keys::SETPOINT_PRESSURE, d.pressure_setpoint),
            flow_setpoint: cfg.get_or(keys::SETPOINT_FLOW, d.flow_setpoint),
            pressure_gains: gains("pressure", d.pressure_gains),
            flow_gains: gains("flow", d.flow_gains),
            calibration: FlowCalibration {
                flow_rate1: cfg.get_or(keys::CALIBRATION_FLOW1, d.calibration.flow_rate1),
                flow_rate2: cfg.get_or(keys::CALIBRATION_FLOW2, d.calibration.flow_rate2),
                opv_pressure: cfg.get_or(keys::CALIBRATION_OPV, d.calibration.opv_pressure),
            },
        }
    }
}

/// Boiler temperature loop parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaterSettings {
    pub enabled: bool,
    pub setpoint_c: f32,
    pub steam_setpoint_c: f32,
    pub kp: f32,
    pub tn: f32,
    pub tv: f32,
    /// Integrator ceiling as a percentage of the relay window.
    pub i_max: f32,
    pub steam_kp: f32,
}

impl Default for HeaterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            setpoint_c: 95.0,
            steam_setpoint_c: 120.0,
            kp: 62.0,
            tn: 52.0,
            tv: 11.5,
            i_max: 55.0,
            steam_kp: 150.0,
        }
    }
}

impl HeaterSettings {
    pub fn load(cfg: &impl ConfigPort) -> Self {
        let d = Self::default();
        Self {
            enabled: cfg.get_or(keys::PID_ENABLED, d.enabled),
            setpoint_c: cfg.get_or(keys::PID_SETPOINT, d.setpoint_c),
            steam_setpoint_c: cfg.get_or(keys::PID_STEAM_SETPOINT, d.steam_setpoint_c),
            kp: cfg.get_or(keys::PID_KP, d.kp),
            tn: cfg.get_or(keys::PID_TN, d.tn),
            tv: cfg.get_or(keys::PID_TV, d.tv),
            i_max: cfg.get_or(keys::PID_I_MAX, d.i_max),
            steam_kp: cfg.get_or(keys::PID_STEAM_KP, d.steam_kp),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandbySettings {
    pub enabled: bool,
    pub minutes: f32,
}

impl StandbySettings {
    pub fn load(cfg: &impl ConfigPort) -> Self {
        Self {
            enabled: cfg.get_or(keys::STANDBY_ENABLED, false),
            minutes: cfg.get_or(keys::STANDBY_TIME, 35.0),
        }
    }
}

/// Everything the supervisor and sub-machines read in one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub brew: BrewSettings,
    pub backflush: BackflushSettings,
    pub switches: SwitchSettings,
    pub sensors: SensorSettings,
    pub pump: PumpSettings,
    pub heater: HeaterSettings,
    pub standby: StandbySettings,
}

impl Settings {
    pub fn load(cfg: &impl ConfigPort) -> Self {
        Self {
            brew: BrewSettings::load(cfg),
            backflush: BackflushSettings::load(cfg),
            switches: SwitchSettings::load(cfg),
            sensors: SensorSettings::load(cfg),
            pump: PumpSettings::load(cfg),
            heater: HeaterSettings::load(cfg),
            standby: StandbySettings::load(cfg),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load(&ParameterStore::defaults())
    }
}

/// Seconds (as configured) to whole milliseconds; negatives clamp to 0.
pub fn secs_to_ms(secs: f32) -> u64 {
    if secs <= 0.0 { 0 } else { (secs * 1000.0).round() as u64 }
}
