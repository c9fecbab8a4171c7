//! Brew profile interpreter.
//!
//! Walks a [`BrewProfile`]'s phases during a shot, evaluating each phase's
//! exit condition every control tick and writing the pump targets into
//! the shared [`PumpLoop`].  Times are milliseconds of brew time (since
//! the shot started), so a paused main loop never skips a phase.

use log::{debug, info, warn};

use crate::config::secs_to_ms;
use crate::control::pid::PidGains;
use crate::control::pump::{PumpLoop, PumpMode};
use crate::profiles::{BrewPhase, BrewProfile, ExitType, PhasePump};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileInputs {
    pub brew_ms: u64,
    /// Filtered pressure (bar).
    pub pressure: f32,
    /// Filtered modelled flow (mL/s).
    pub flow: f32,
    pub shot_weight: f32,
    pub scale_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileEvent {
    /// Entered this phase index (0 when a run starts).
    PhaseChanged(usize),
    /// Last phase exited.  Reported once per run.
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRunner {
    start: bool,
    phase_index: usize,
    phase_started_ms: u64,
    last_pressure: f32,
    last_set_pressure: f32,
    last_flow: f32,
    last_set_flow: f32,
    last_weight: f32,
    filtered_weight: f32,
    phase_reset: bool,
    complete: bool,
}

impl Default for ProfileRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileRunner {
    pub fn new() -> Self {
        Self {
            start: true,
            phase_index: 0,
            phase_started_ms: 0,
            last_pressure: 0.0,
            last_set_pressure: 0.0,
            last_flow: 0.0,
            last_set_flow: 0.0,
            last_weight: 0.0,
            filtered_weight: 0.0,
            phase_reset: true,
            complete: false,
        }
    }

    /// Arm a fresh run from phase 0 (called every tick outside a shot).
    pub fn restart(&mut self) {
        self.start = true;
        self.phase_index = 0;
    }

    pub fn phase_index(&self) -> usize {
        self.phase_index
    }

    pub fn phase_started_ms(&self) -> u64 {
        self.phase_started_ms
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn run(
        &mut self,
        profile: &BrewProfile,
        inputs: &ProfileInputs,
        lp: &mut PumpLoop,
        pressure_gains: &PidGains,
        flow_gains: &PidGains,
    ) -> Option<ProfileEvent> {
        let started = self.start;
        if self.start {
            self.start = false;
            self.complete = false;
            self.last_pressure = 0.0;
            self.last_set_pressure = 0.0;
            self.last_flow = 0.0;
            self.last_set_flow = 0.0;
            self.last_weight = 0.0;
            self.filtered_weight = 0.0;
            self.phase_started_ms = 0;
            self.phase_reset = true;
            debug!("profile: running '{}'", profile.name);
        }

        let phases = &profile.phases;
        let mut event = (started && !phases.is_empty()).then_some(ProfileEvent::PhaseChanged(0));

        while let Some(phase) = phases.get(self.phase_index) {
            if !self.exit_reached(phase, inputs) {
                break;
            }

            self.last_pressure = inputs.pressure;
            self.last_set_pressure = phase.pressure;
            self.last_flow = inputs.flow;
            self.last_set_flow = phase.flow;
            self.phase_index += 1;
            self.phase_started_ms = inputs.brew_ms;
            self.phase_reset = true;
            self.last_weight = inputs.shot_weight;
            self.filtered_weight = self.last_weight;

            match phases.get(self.phase_index) {
                Some(next) => {
                    debug!(
                        "profile: phase {} '{}' for {:.1} s",
                        self.phase_index, next.name, next.seconds
                    );
                    event = Some(ProfileEvent::PhaseChanged(self.phase_index));
                }
                None => {
                    self.complete = true;
                    info!("profile: '{}' complete at {} ms", profile.name, inputs.brew_ms);
                    return Some(ProfileEvent::Completed);
                }
            }
        }

        let phase = phases.get(self.phase_index)?;
        self.steer(phase, inputs, lp, pressure_gains, flow_gains);
        event
    }

    fn exit_reached(&self, phase: &BrewPhase, inputs: &ProfileInputs) -> bool {
        let timed_out = inputs.brew_ms > secs_to_ms(phase.seconds) + self.phase_started_ms;

        let by_condition = match phase.exit_type {
            ExitType::None => timed_out,
            ExitType::PressureOver => inputs.pressure >= phase.exit_pressure_over,
            ExitType::PressureUnder => inputs.pressure <= phase.exit_pressure_under,
            ExitType::FlowOver => inputs.flow >= phase.exit_flow_over,
            ExitType::FlowUnder => inputs.flow <= phase.exit_flow_under,
        };

        let by_weight = inputs.scale_enabled && phase.weight > 0.0 && inputs.shot_weight >= phase.weight;

        by_condition || by_weight || timed_out
    }

    fn steer(
        &mut self,
        phase: &BrewPhase,
        inputs: &ProfileInputs,
        lp: &mut PumpLoop,
        pressure_gains: &PidGains,
        flow_gains: &PidGains,
    ) {
        if self.phase_reset && phase.is_smooth() && phase.seconds < 1.0 {
            warn!(
                "profile: smooth phase '{}' lasts {:.2} s, under the 1 s minimum",
                phase.name, phase.seconds
            );
        }

        lp.ceiling = phase.max_secondary;
        lp.range = phase.max_secondary_range;
        self.filtered_weight = self.filtered_weight.max(inputs.shot_weight);

        let (primary, other, ki_primary, ki_other, goal) = match phase.pump {
            PhasePump::Flow => (PumpMode::Flow, PumpMode::Pressure, flow_gains.ki, pressure_gains.ki, phase.flow),
            PhasePump::Pressure => (PumpMode::Pressure, PumpMode::Flow, pressure_gains.ki, flow_gains.ki, phase.pressure),
        };

        let target = if phase.is_smooth() {
            let (last, last_set) = match phase.pump {
                PhasePump::Flow => (&mut self.last_flow, self.last_set_flow),
                PhasePump::Pressure => (&mut self.last_pressure, self.last_set_pressure),
            };
            if self.phase_reset {
                if lp.mode == other {
                    lp.pid.rescale(ki_other, ki_primary);
                    if last_set > 0.0 {
                        *last = last_set;
                    }
                } else {
                    *last = last_set;
                }
                lp.mode = primary;
                self.phase_reset = false;
            }
            let from = *last;
            from + (goal - from) * self.ramp_fraction(phase, inputs)
        } else {
            if self.phase_reset {
                lp.pid.reset();
                self.phase_reset = false;
            }
            lp.mode = primary;
            goal
        };

        match phase.pump {
            PhasePump::Flow => {
                lp.set_flow = target;
                lp.set_pressure = 0.0;
            }
            PhasePump::Pressure => {
                lp.set_pressure = target;
                lp.set_flow = 0.0;
            }
        }
    }

    /// Progress through a smooth phase: by weight when the phase is
    /// weight-bounded and a scale is fitted, otherwise by time.
    fn ramp_fraction(&self, phase: &BrewPhase, inputs: &ProfileInputs) -> f32 {
        let t = if phase.exit_type == ExitType::None && phase.weight > 0.0 && inputs.scale_enabled {
            let span = phase.weight - self.last_weight;
            if span > 0.0 { (self.filtered_weight - self.last_weight) / span } else { 1.0 }
        } else if phase.seconds > 0.0 {
            let elapsed_s = inputs.brew_ms.saturating_sub(self.phase_started_ms) as f32 / 1000.0;
            elapsed_s / phase.seconds
        } else {
            1.0
        };
        t.clamp(0.0, 1.0)
    }
}
