//! Zero-cross synchronised pump dimmer.
//!
//! Two firing strategies, selectable at runtime:
//!
//! - **PSM** (burst fire): whole half-cycles are skipped so the average
//!   over several cycles matches the requested power.
//! - **Phase cut**: each half-cycle fires after a delay looked up in the
//!   [`calibration`] table.
//!
//! ## ISR sharing
//!
//! [`DimmerShared`] is the only state the zero-cross and phase-timer
//! interrupts see.  Every field is a single-word atomic written by the
//! main loop and read by the ISR (or vice versa); no lock is taken.

pub mod calibration;
pub mod isr;

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use embedded_hal::digital::OutputPin;
use log::debug;

use calibration::{HALF_CYCLE_50HZ_US, MainsFrequency, MainsFrequencyDetector, phase_delay_us};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DimmerMethod {
    Psm = 0,
    Phase = 1,
}

impl DimmerMethod {
    /// `dimmer.type` as stored in config: 1 is phase cut, anything else PSM.
    pub fn from_index(i: i32) -> Self {
        if i == 1 { Self::Phase } else { Self::Psm }
    }
}

/// Pump flow model coefficients.
///
/// `flow_rate1` and `flow_rate2` are the mL delivered in 30 s at 0 bar and
/// at the OPV pressure respectively.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowCalibration {
    pub flow_rate1: f32,
    pub flow_rate2: f32,
    pub opv_pressure: f32,
}

impl Default for FlowCalibration {
    fn default() -> Self {
        Self {
            flow_rate1: 292.4,
            flow_rate2: 124.4,
            opv_pressure: 10.0,
        }
    }
}

impl FlowCalibration {
    /// Full-power flow (mL/s) at `pressure_bar`.
    pub fn full_power_flow(&self, pressure_bar: f32) -> f32 {
        let slope = if self.opv_pressure > 0.0 {
            (self.flow_rate1 - self.flow_rate2) / self.opv_pressure
        } else {
            0.0
        };
        ((-slope * pressure_bar + self.flow_rate1) / 30.0).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// ISR-shared state
// ---------------------------------------------------------------------------

pub struct DimmerShared {
    pub(crate) power: AtomicU8,
    pub(crate) on: AtomicBool,
    pub(crate) method: AtomicU8,
    pub(crate) scaled_power: AtomicU8,
    pub(crate) delay_us: AtomicU32,
    pub(crate) psm_accumulator: AtomicU32,
    pub(crate) last_zero_cross_ms: AtomicU32,
    pub(crate) half_cycle_us: AtomicU32,
    pub(crate) pulse_active: AtomicBool,
    crossings: AtomicU32,
    crossings_seen: AtomicU32,
    last_cross_us: AtomicU32,
}

/// The board's single dimmer.
pub static DIMMER: DimmerShared = DimmerShared::new();

impl DimmerShared {
    pub const fn new() -> Self {
        Self {
            power: AtomicU8::new(0),
            on: AtomicBool::new(false),
            method: AtomicU8::new(DimmerMethod::Psm as u8),
            scaled_power: AtomicU8::new(0),
            delay_us: AtomicU32::new(HALF_CYCLE_50HZ_US),
            psm_accumulator: AtomicU32::new(0),
            last_zero_cross_ms: AtomicU32::new(0),
            half_cycle_us: AtomicU32::new(HALF_CYCLE_50HZ_US),
            pulse_active: AtomicBool::new(false),
            crossings: AtomicU32::new(0),
            crossings_seen: AtomicU32::new(0),
            last_cross_us: AtomicU32::new(0),
        }
    }

    pub fn method(&self) -> DimmerMethod {
        if self.method.load(Ordering::Relaxed) == DimmerMethod::Phase as u8 {
            DimmerMethod::Phase
        } else {
            DimmerMethod::Psm
        }
    }

    pub(crate) fn record_crossing(&self, now_us: u32) {
        self.last_cross_us.store(now_us, Ordering::Relaxed);
        self.crossings.fetch_add(1, Ordering::Release);
    }

    /// Zero crossings since the last call and the timestamp of the newest
    /// one, for mains detection on the main loop.
    pub fn take_crossings(&self) -> Option<(u32, u32)> {
        let count = self.crossings.load(Ordering::Acquire);
        let seen = self.crossings_seen.swap(count, Ordering::Relaxed);
        let fresh = count.wrapping_sub(seen);
        if fresh == 0 {
            return None;
        }
        Some((fresh, self.last_cross_us.load(Ordering::Relaxed)))
    }
}

impl Default for DimmerShared {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Main-loop side
// ---------------------------------------------------------------------------

/// Pump gate driven by the zero-cross ISR.
pub struct PumpDimmer<P> {
    pin: P,
    shared: &'static DimmerShared,
    pressure_bar: f32,
    mains: MainsFrequencyDetector,
}

impl<P: OutputPin> PumpDimmer<P> {
    pub fn new(mut pin: P, shared: &'static DimmerShared) -> Self {
        let _ = pin.set_low();
        shared.on.store(false, Ordering::Release);
        Self {
            pin,
            shared,
            pressure_bar: 0.0,
            mains: MainsFrequencyDetector::new(),
        }
    }

    pub fn on(&mut self) {
        let was_on = self.shared.on.swap(true, Ordering::AcqRel);
        if !was_on && self.shared.method() == DimmerMethod::Psm {
            self.shared.psm_accumulator.store(0, Ordering::Relaxed);
        }
    }

    pub fn off(&mut self) {
        self.shared.on.store(false, Ordering::Release);
        let _ = self.pin.set_low();
    }

    pub fn state(&self) -> bool {
        self.shared.on.load(Ordering::Acquire)
    }

    pub fn power(&self) -> u8 {
        self.shared.power.load(Ordering::Relaxed)
    }

    pub fn scaled_power(&self) -> u8 {
        self.shared.scaled_power.load(Ordering::Relaxed)
    }

    pub fn delay_us(&self) -> u32 {
        self.shared.delay_us.load(Ordering::Relaxed)
    }

    pub fn method(&self) -> DimmerMethod {
        self.shared.method()
    }

    pub fn set_power(&mut self, power: u8) {
        self.shared.power.store(power.min(100), Ordering::Relaxed);
        self.recompute();
    }

    /// Measured pressure for the phase-mode power floor.
    pub fn set_pressure(&mut self, bar: f32) {
        self.pressure_bar = bar;
        self.recompute();
    }

    pub fn set_control_method(&mut self, method: DimmerMethod) {
        if method != self.method() {
            debug!("dimmer: control method {:?}", method);
            self.shared.method.store(method as u8, Ordering::Relaxed);
            self.shared.psm_accumulator.store(0, Ordering::Relaxed);
            self.recompute();
        }
    }

    pub fn set_mains_frequency(&mut self, freq: MainsFrequency) {
        self.shared.half_cycle_us.store(freq.half_cycle_us(), Ordering::Relaxed);
        self.recompute();
    }

    /// Feed crossings seen by the ISR into the mains detector.  Once it
    /// decides, the half-cycle is applied and later calls do nothing.
    pub fn poll_mains(&mut self) -> Option<MainsFrequency> {
        if let Some(freq) = self.mains.result() {
            return Some(freq);
        }
        let (crossings, timestamp_us) = self.shared.take_crossings()?;
        let freq = self.mains.feed(crossings, timestamp_us)?;
        self.set_mains_frequency(freq);
        Some(freq)
    }

    pub fn half_cycle_us(&self) -> u32 {
        self.shared.half_cycle_us.load(Ordering::Relaxed)
    }

    /// Modelled flow (mL/s) at `pressure_bar` for the current output.
    pub fn estimate_flow(&self, pressure_bar: f32, cal: &FlowCalibration) -> f32 {
        if !self.state() {
            return 0.0;
        }
        let power = match self.method() {
            DimmerMethod::Psm => self.power(),
            DimmerMethod::Phase => self.scaled_power(),
        };
        f32::from(power) / 100.0 * cal.full_power_flow(pressure_bar)
    }

    fn recompute(&mut self) {
        let power = self.power();
        let scaled = match self.method() {
            DimmerMethod::Psm => power,
            DimmerMethod::Phase => scale_for_pressure(power, self.pressure_bar),
        };
        self.shared.scaled_power.store(scaled, Ordering::Relaxed);
        let half_cycle = self.shared.half_cycle_us.load(Ordering::Relaxed);
        self.shared
            .delay_us
            .store(phase_delay_us(scaled, half_cycle), Ordering::Relaxed);
    }
}

/// Phase-mode power floor: `scaler + (100 - scaler) * power / 100` with
/// `scaler = clamp(pressure * 6, 0, 100)`.
pub fn scale_for_pressure(power: u8, pressure_bar: f32) -> u8 {
    if power == 0 {
        return 0;
    }
    let scaler = (pressure_bar * 6.0).clamp(0.0, 100.0);
    let scaled = scaler + (100.0 - scaler) * f32::from(power) / 100.0;
    scaled.clamp(0.0, 100.0) as u8
}
