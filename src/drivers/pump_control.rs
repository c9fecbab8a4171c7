//! The single pump actuation path: a plain relay or the zero-cross dimmer.

use embedded_hal::digital::OutputPin;

use crate::drivers::dimmer::calibration::MainsFrequency;
use crate::drivers::dimmer::{DimmerMethod, FlowCalibration, PumpDimmer};
use crate::drivers::relay::Relay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpControlKind {
    Relay,
    Dimmer,
}

pub enum PumpControl<P> {
    Relay(Relay<P>),
    Dimmer(PumpDimmer<P>),
}

impl<P: OutputPin> PumpControl<P> {
    pub fn on(&mut self) {
        match self {
            Self::Relay(r) => r.on(),
            Self::Dimmer(d) => d.on(),
        }
    }

    pub fn off(&mut self) {
        match self {
            Self::Relay(r) => r.off(),
            Self::Dimmer(d) => d.off(),
        }
    }

    pub fn state(&self) -> bool {
        match self {
            Self::Relay(r) => r.state(),
            Self::Dimmer(d) => d.state(),
        }
    }

    pub fn kind(&self) -> PumpControlKind {
        match self {
            Self::Relay(_) => PumpControlKind::Relay,
            Self::Dimmer(_) => PumpControlKind::Dimmer,
        }
    }

    pub fn set_power(&mut self, power: u8) {
        if let Self::Dimmer(d) = self {
            d.set_power(power);
        }
    }

    pub fn set_pressure(&mut self, bar: f32) {
        if let Self::Dimmer(d) = self {
            d.set_pressure(bar);
        }
    }

    pub fn set_control_method(&mut self, method: DimmerMethod) {
        if let Self::Dimmer(d) = self {
            d.set_control_method(method);
        }
    }

    /// Relay pumps run flat out, so the model is evaluated at 100 %.
    pub fn estimate_flow(&self, pressure_bar: f32, cal: &FlowCalibration) -> f32 {
        match self {
            Self::Relay(r) if r.state() => cal.full_power_flow(pressure_bar),
            Self::Relay(_) => 0.0,
            Self::Dimmer(d) => d.estimate_flow(pressure_bar, cal),
        }
    }

    /// Mains detection for the dimmer; a relay has nothing to time.
    pub fn poll_mains(&mut self) -> Option<MainsFrequency> {
        match self {
            Self::Dimmer(d) => d.poll_mains(),
            Self::Relay(_) => None,
        }
    }

    pub fn dimmer_mut(&mut self) -> Option<&mut PumpDimmer<P>> {
        match self {
            Self::Dimmer(d) => Some(d),
            Self::Relay(_) => None,
        }
    }
}
