//! Brew pressure transducer and its smoothing filter.
//!
//! Ratiometric 0.5–4.5 V sensor for 0–16 bar, behind a 2:3 divider so the
//! ADC sees 0.33–3.0 V.

use crate::drivers::hw_init;
use crate::pins;

const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;
const DIVIDER: f32 = 2.0 / 3.0;
const V_MIN: f32 = 0.5 * DIVIDER;
const V_MAX: f32 = 4.5 * DIVIDER;
pub const RANGE_BAR: f32 = 16.0;

/// Weight of the newest sample in the moving average.
pub const FILTER_ALPHA: f32 = 0.3;

pub struct PressureTransducer {
    channel: u32,
}

impl Default for PressureTransducer {
    fn default() -> Self {
        Self::new(pins::PRESSURE_ADC_CHANNEL)
    }
}

impl PressureTransducer {
    pub fn new(channel: u32) -> Self {
        Self { channel }
    }

    /// Instantaneous pressure in bar, clamped to the sensor range.
    pub fn read(&self) -> f32 {
        raw_to_bar(hw_init::adc1_read(self.channel))
    }
}

pub fn raw_to_bar(raw: u16) -> f32 {
    let voltage = raw as f32 / ADC_MAX * V_REF;
    ((voltage - V_MIN) / (V_MAX - V_MIN) * RANGE_BAR).clamp(0.0, RANGE_BAR)
}

/// Exponential moving average: `0.3 * new + 0.7 * old`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PressureFilter {
    value: f32,
}

impl PressureFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, sample: f32) -> f32 {
        self.value = FILTER_ALPHA * sample + (1.0 - FILTER_ALPHA) * self.value;
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}
