//! Pump controller: setpoint selection, mode handling and the PID step.
//!
//! Runs once per main-loop tick but only computes a new output every
//! [`CONTROL_INTERVAL_MS`] while the pump is energised.  In profile mode
//! the [`ProfileRunner`] writes the targets; otherwise they come straight
//! from config.

use heapless::HistoryBuffer;
use log::{debug, info, warn};

use crate::config::PumpSettings;
use crate::control::pid::{PidGains, PumpPid};
use crate::control::profile::{ProfileEvent, ProfileInputs, ProfileRunner};
use crate::drivers::dimmer::DimmerMethod;
use crate::fsm::MachineState;
use crate::profiles::ProfileCatalog;

pub const CONTROL_INTERVAL_MS: u64 = 50;
pub const MAX_CONTROL_INTERVAL_MS: u64 = 100;
pub const HISTORY_LEN: usize = 20;

/// Backflush always pushes against the blind basket at this pressure.
pub const BACKFLUSH_PRESSURE_BAR: f32 = 9.0;
/// Pressure ceiling applied in plain flow mode.
pub const FLOW_MODE_CEILING_BAR: f32 = 9.0;
pub const FLOW_MODE_RANGE_BAR: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpMode {
    Power,
    Pressure,
    Flow,
    Profile,
}

impl PumpMode {
    /// `dimmer.mode` as stored in config.  Unknown values fall back to power.
    pub fn from_index(i: i32) -> Self {
        match i {
            1 => Self::Pressure,
            2 => Self::Flow,
            3 => Self::Profile,
            _ => Self::Power,
        }
    }

    pub fn index(self) -> i32 {
        match self {
            Self::Power => 0,
            Self::Pressure => 1,
            Self::Flow => 2,
            Self::Profile => 3,
        }
    }
}

/// Shaping for [`taper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaperCurve {
    Linear,
    Quadratic,
    Cubic,
}

/// Pull `target` toward zero as `input` rises through
/// `ceiling..ceiling + range`.  Disabled when either bound is not positive.
pub fn taper(target: f32, input: f32, ceiling: f32, range: f32, curve: TaperCurve) -> f32 {
    if ceiling > 0.0 && range > 0.0 && input > ceiling {
        let t = ((input - ceiling) / range).clamp(0.0, 1.0);
        let t = match curve {
            TaperCurve::Linear => t,
            TaperCurve::Quadratic => t * t,
            TaperCurve::Cubic => t * t * t,
        };
        target * (1.0 - t)
    } else {
        target
    }
}

/// The live control loop state the profile interpreter steers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpLoop {
    /// Active control variable; never [`PumpMode::Profile`].
    pub mode: PumpMode,
    pub set_power: f32,
    pub set_pressure: f32,
    pub set_flow: f32,
    /// Secondary-variable ceiling and range for [`taper`].
    pub ceiling: f32,
    pub range: f32,
    pub pid: PumpPid,
}

impl Default for PumpLoop {
    fn default() -> Self {
        Self {
            mode: PumpMode::Pressure,
            set_power: 100.0,
            set_pressure: 9.0,
            set_flow: 8.0,
            ceiling: 0.0,
            range: 0.0,
            pid: PumpPid::new(),
        }
    }
}

/// Per-tick measurements and machine context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpInputs {
    pub now_ms: u64,
    pub machine: MachineState,
    /// Commanded pump state for this tick.
    pub pump_on: bool,
    pub pressure_sensor: bool,
    pub scale_enabled: bool,
    /// Filtered pressure (bar).
    pub pressure: f32,
    /// Filtered modelled flow (mL/s).
    pub flow: f32,
    /// Milliseconds since the shot started.
    pub brew_ms: u64,
    pub shot_weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpOutput {
    pub power: u8,
    pub method: DimmerMethod,
    /// Set on the tick `dimmer.type` changed; the adapter re-programs the
    /// dimmer.
    pub method_changed: bool,
    pub mode: PumpMode,
    /// Phase entry or completion from the profile driving this shot.
    pub profile_event: Option<ProfileEvent>,
}

/// One recorded control step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidSample {
    pub dt_ms: u64,
    pub pressure: f32,
    pub set_pressure: f32,
    pub flow: f32,
    pub set_flow: f32,
    pub weight: f32,
    pub power: u8,
}

pub struct PumpController {
    state: PumpLoop,
    last_tick_ms: u64,
    last_mode: Option<PumpMode>,
    last_profile: Option<usize>,
    last_method: Option<DimmerMethod>,
    power: u8,
    history: HistoryBuffer<PidSample, HISTORY_LEN>,
}

impl Default for PumpController {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpController {
    pub fn new() -> Self {
        Self {
            state: PumpLoop::default(),
            last_tick_ms: 0,
            last_mode: None,
            last_profile: None,
            last_method: None,
            power: 0,
            history: HistoryBuffer::new(),
        }
    }

    pub fn state(&self) -> &PumpLoop {
        &self.state
    }

    pub fn power(&self) -> u8 {
        self.power
    }

    /// Most recent control steps, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &PidSample> {
        self.history.oldest_ordered()
    }

    pub fn tick(
        &mut self,
        inputs: &PumpInputs,
        settings: &PumpSettings,
        runner: &mut ProfileRunner,
        catalog: &ProfileCatalog,
    ) -> Option<PumpOutput> {
        if !settings.enabled {
            return None;
        }

        if inputs.machine != MachineState::Brew {
            runner.restart();
            self.state.ceiling = 0.0;
            self.state.range = 0.0;
        }

        let mode = if inputs.pressure_sensor { settings.mode } else { PumpMode::Power };

        if self.last_mode != Some(mode) || self.last_profile != Some(settings.profile) {
            self.last_mode = Some(mode);
            self.last_profile = Some(settings.profile);
            self.state.pid.reset();
            if mode == PumpMode::Profile {
                match catalog.get(settings.profile) {
                    Some(p) => info!("pump: profile {} '{}'", settings.profile, p.name),
                    None => warn!("pump: profile index {} out of range", settings.profile),
                }
            }
            debug!("pump: mode {:?}", mode);
        }

        let method_changed = self.last_method != Some(settings.method);
        if method_changed {
            self.last_method = Some(settings.method);
        }

        let profile_event = self.select_targets(inputs, settings, mode, runner, catalog);

        if inputs.pump_on {
            let elapsed = inputs.now_ms.saturating_sub(self.last_tick_ms);
            if elapsed >= CONTROL_INTERVAL_MS {
                self.last_tick_ms = inputs.now_ms;
                self.step(inputs, settings, elapsed.min(MAX_CONTROL_INTERVAL_MS));
            }
        } else {
            self.state.pid.reset();
            self.last_tick_ms = inputs.now_ms.saturating_sub(CONTROL_INTERVAL_MS);
        }

        Some(PumpOutput {
            power: self.power,
            method: settings.method,
            method_changed,
            mode: self.state.mode,
            profile_event,
        })
    }

    fn select_targets(
        &mut self,
        inputs: &PumpInputs,
        settings: &PumpSettings,
        mode: PumpMode,
        runner: &mut ProfileRunner,
        catalog: &ProfileCatalog,
    ) -> Option<ProfileEvent> {
        let s = &mut self.state;
        let mut event = None;
        match inputs.machine {
            MachineState::Backflush => {
                s.mode = PumpMode::Pressure;
                s.set_pressure = BACKFLUSH_PRESSURE_BAR;
            }
            MachineState::ManualFlush => match mode {
                PumpMode::Flow => {
                    s.mode = PumpMode::Flow;
                    s.set_flow = settings.flow_setpoint;
                }
                PumpMode::Power => {
                    s.mode = PumpMode::Power;
                    s.set_power = settings.power_setpoint;
                }
                _ => {
                    s.mode = PumpMode::Power;
                    s.set_power = 100.0;
                }
            },
            _ => match mode {
                PumpMode::Power => {
                    s.mode = PumpMode::Power;
                    s.set_power = settings.power_setpoint;
                }
                PumpMode::Pressure => {
                    s.mode = PumpMode::Pressure;
                    s.set_pressure = settings.pressure_setpoint;
                }
                PumpMode::Flow => {
                    s.mode = PumpMode::Flow;
                    s.set_flow = settings.flow_setpoint;
                    s.ceiling = FLOW_MODE_CEILING_BAR;
                    s.range = FLOW_MODE_RANGE_BAR;
                }
                PumpMode::Profile => match catalog.get(settings.profile) {
                    Some(profile) if inputs.machine == MachineState::Brew => {
                        let pin = ProfileInputs {
                            brew_ms: inputs.brew_ms,
                            pressure: inputs.pressure,
                            flow: inputs.flow,
                            shot_weight: inputs.shot_weight,
                            scale_enabled: inputs.scale_enabled,
                        };
                        event = runner.run(profile, &pin, s, &settings.pressure_gains, &settings.flow_gains);
                    }
                    Some(_) => {
                        // Hot water and steam outside a shot run on the power setpoint.
                        s.mode = PumpMode::Power;
                        s.set_power = settings.power_setpoint;
                    }
                    None => {
                        s.mode = PumpMode::Power;
                        s.set_power = 0.0;
                    }
                },
            },
        }
        event
    }

    fn step(&mut self, inputs: &PumpInputs, settings: &PumpSettings, dt_ms: u64) {
        let s = &mut self.state;
        let dt = dt_ms as f32 / 1000.0;

        let power = match s.mode {
            PumpMode::Pressure => {
                let target = taper(s.set_pressure, inputs.flow, s.ceiling, s.range, TaperCurve::Quadratic);
                pid_power(&mut s.pid, target, inputs.pressure, &settings.pressure_gains, settings.i_max, dt)
            }
            PumpMode::Flow => {
                let target = taper(s.set_flow, inputs.pressure, s.ceiling, s.range, TaperCurve::Quadratic);
                pid_power(&mut s.pid, target, inputs.flow, &settings.flow_gains, settings.i_max, dt)
            }
            PumpMode::Power | PumpMode::Profile => s.set_power.clamp(0.0, 100.0) as u8,
        };
        self.power = power;

        self.history.write(PidSample {
            dt_ms,
            pressure: inputs.pressure,
            set_pressure: s.set_pressure,
            flow: inputs.flow,
            set_flow: s.set_flow,
            weight: inputs.shot_weight,
            power,
        });
    }
}

fn pid_power(pid: &mut PumpPid, target: f32, input: f32, gains: &PidGains, i_max: f32, dt: f32) -> u8 {
    // Truncation, not rounding: 99.9 % is 99.
    pid.compute(target, input, gains, i_max, dt) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(mode: PumpMode) -> PumpSettings {
        PumpSettings {
            enabled: true,
            mode,
            ..PumpSettings::default()
        }
    }

    fn inputs(machine: MachineState, now_ms: u64, pump_on: bool) -> PumpInputs {
        PumpInputs {
            now_ms,
            machine,
            pump_on,
            pressure_sensor: true,
            scale_enabled: false,
            pressure: 0.0,
            flow: 0.0,
            brew_ms: 0,
            shot_weight: 0.0,
        }
    }

    fn run(ctl: &mut PumpController, inp: &PumpInputs, s: &PumpSettings) -> Option<PumpOutput> {
        let catalog = ProfileCatalog::builtin().unwrap();
        let mut runner = ProfileRunner::new();
        ctl.tick(inp, s, &mut runner, &catalog)
    }

    #[test]
    fn taper_curves() {
        assert_eq!(taper(8.0, 5.0, 9.0, 1.0, TaperCurve::Quadratic), 8.0);
        assert_eq!(taper(8.0, 9.5, 9.0, 1.0, TaperCurve::Linear), 4.0);
        assert_eq!(taper(8.0, 9.5, 9.0, 1.0, TaperCurve::Quadratic), 6.0);
        assert_eq!(taper(8.0, 9.5, 9.0, 1.0, TaperCurve::Cubic), 7.0);
        assert_eq!(taper(8.0, 20.0, 9.0, 1.0, TaperCurve::Quadratic), 0.0);
        assert_eq!(taper(8.0, 20.0, 0.0, 1.0, TaperCurve::Quadratic), 8.0);
        assert_eq!(taper(8.0, 20.0, 9.0, 0.0, TaperCurve::Quadratic), 8.0);
    }

    #[test]
    fn disabled_dimmer_returns_none() {
        let mut ctl = PumpController::new();
        let s = PumpSettings::default();
        assert!(run(&mut ctl, &inputs(MachineState::Brew, 1_000, true), &s).is_none());
    }

    #[test]
    fn power_mode_passes_setpoint() {
        let mut ctl = PumpController::new();
        let mut s = settings(PumpMode::Power);
        s.power_setpoint = 63.7;
        let out = run(&mut ctl, &inputs(MachineState::Brew, 1_000, true), &s).unwrap();
        assert_eq!(out.power, 63);
        assert_eq!(out.mode, PumpMode::Power);
        assert!(out.method_changed);
        let out = run(&mut ctl, &inputs(MachineState::Brew, 1_010, true), &s).unwrap();
        assert!(!out.method_changed);
    }

    #[test]
    fn no_pressure_sensor_forces_power() {
        let mut ctl = PumpController::new();
        let s = settings(PumpMode::Pressure);
        let mut inp = inputs(MachineState::Brew, 1_000, true);
        inp.pressure_sensor = false;
        let out = run(&mut ctl, &inp, &s).unwrap();
        assert_eq!(out.mode, PumpMode::Power);
        assert_eq!(out.power, 100);
    }

    #[test]
    fn backflush_overrides_to_nine_bar() {
        let mut ctl = PumpController::new();
        let s = settings(PumpMode::Power);
        let out = run(&mut ctl, &inputs(MachineState::Backflush, 1_000, true), &s).unwrap();
        assert_eq!(out.mode, PumpMode::Pressure);
        assert_eq!(ctl.state().set_pressure, BACKFLUSH_PRESSURE_BAR);
    }

    #[test]
    fn manual_flush_overrides() {
        let mut ctl = PumpController::new();
        let out = run(&mut ctl, &inputs(MachineState::ManualFlush, 1_000, true), &settings(PumpMode::Pressure)).unwrap();
        assert_eq!(out.mode, PumpMode::Power);
        assert_eq!(out.power, 100);

        let out = run(&mut ctl, &inputs(MachineState::ManualFlush, 2_000, true), &settings(PumpMode::Flow)).unwrap();
        assert_eq!(out.mode, PumpMode::Flow);
        assert_eq!(ctl.state().set_flow, 8.0);
    }

    #[test]
    fn flow_mode_sets_pressure_ceiling() {
        let mut ctl = PumpController::new();
        run(&mut ctl, &inputs(MachineState::PidNormal, 1_000, false), &settings(PumpMode::Flow));
        assert_eq!(ctl.state().ceiling, FLOW_MODE_CEILING_BAR);
        assert_eq!(ctl.state().range, FLOW_MODE_RANGE_BAR);
    }

    #[test]
    fn computes_only_every_fifty_ms() {
        let mut ctl = PumpController::new();
        let s = settings(PumpMode::Pressure);
        let mut inp = inputs(MachineState::Brew, 1_000, true);
        inp.pressure = 4.0;
        run(&mut ctl, &inp, &s);
        assert_eq!(ctl.history().count(), 1);
        inp.now_ms = 1_030;
        run(&mut ctl, &inp, &s);
        assert_eq!(ctl.history().count(), 1);
        inp.now_ms = 1_050;
        run(&mut ctl, &inp, &s);
        assert_eq!(ctl.history().count(), 2);
        assert_eq!(ctl.history().last().unwrap().dt_ms, 50);
    }

    #[test]
    fn dt_capped_after_stall() {
        let mut ctl = PumpController::new();
        let s = settings(PumpMode::Pressure);
        run(&mut ctl, &inputs(MachineState::Brew, 1_000, true), &s);
        run(&mut ctl, &inputs(MachineState::Brew, 5_000, true), &s);
        assert_eq!(ctl.history().last().unwrap().dt_ms, MAX_CONTROL_INTERVAL_MS);
    }

    #[test]
    fn pump_off_resets_pid() {
        let mut ctl = PumpController::new();
        let s = settings(PumpMode::Pressure);
        let mut inp = inputs(MachineState::Brew, 1_000, true);
        inp.pressure = 3.0;
        run(&mut ctl, &inp, &s);
        assert!(ctl.state().pid.integral() != 0.0);
        inp.pump_on = false;
        inp.now_ms = 1_200;
        run(&mut ctl, &inp, &s);
        assert_eq!(ctl.state().pid.integral(), 0.0);
        // next on-tick computes immediately with a 50 ms step
        inp.pump_on = true;
        inp.now_ms = 1_201;
        run(&mut ctl, &inp, &s);
        assert_eq!(ctl.history().last().unwrap().dt_ms, 51);
    }

    #[test]
    fn history_is_bounded() {
        let mut ctl = PumpController::new();
        let s = settings(PumpMode::Power);
        for i in 0..50 {
            run(&mut ctl, &inputs(MachineState::Brew, 1_000 + i * 60, true), &s);
        }
        assert_eq!(ctl.history().count(), HISTORY_LEN);
    }

    #[test]
    fn invalid_profile_is_safe_idle() {
        let mut ctl = PumpController::new();
        let mut s = settings(PumpMode::Profile);
        s.profile = 99;
        let out = run(&mut ctl, &inputs(MachineState::Brew, 1_000, true), &s).unwrap();
        assert_eq!(out.power, 0);
        assert_eq!(out.mode, PumpMode::Power);
    }

    #[test]
    fn profile_events_ride_on_the_output() {
        let catalog = ProfileCatalog::from_json(
            r#"[{"name":"two","shortname":"two","phases":[
                {"name":"a","pressure":4,"seconds":1},
                {"name":"b","pressure":9,"seconds":1}]}]"#,
        )
        .unwrap();
        let mut ctl = PumpController::new();
        let mut runner = ProfileRunner::new();
        let s = settings(PumpMode::Profile);
        let mut tick = |brew_ms: u64, machine: MachineState| {
            let mut inp = inputs(machine, 1_000 + brew_ms, true);
            inp.brew_ms = brew_ms;
            ctl.tick(&inp, &s, &mut runner, &catalog).unwrap().profile_event
        };

        assert_eq!(tick(0, MachineState::Brew), Some(ProfileEvent::PhaseChanged(0)));
        assert_eq!(tick(500, MachineState::Brew), None);
        assert_eq!(tick(1_100, MachineState::Brew), Some(ProfileEvent::PhaseChanged(1)));
        assert_eq!(tick(2_200, MachineState::Brew), Some(ProfileEvent::Completed));
        assert_eq!(tick(3_000, MachineState::Brew), None);
        // outside a shot the profile is not running
        assert_eq!(tick(0, MachineState::PidNormal), None);
    }

    #[test]
    fn mode_index_roundtrip() {
        for i in 0..4 {
            assert_eq!(PumpMode::from_index(i).index(), i);
        }
        assert_eq!(PumpMode::from_index(42), PumpMode::Power);
    }
}
