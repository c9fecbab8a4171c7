//! Phase-cut firing delay calibration and mains frequency detection.
//!
//! The delay table is expressed as a fraction of the mains half-cycle so
//! one table serves 50 Hz and 60 Hz supplies once the half-cycle has been
//! measured.  The coarse segment covers 0–80 % power in 10 % steps; the
//! fine segment covers 80–100 % in 5 % steps where the pump's response
//! curve is steepest.

use log::{info, warn};

/// Delay fractions for 0, 10, … 80 % power.
const COARSE: [f32; 9] = [1.00, 0.80, 0.70, 0.62, 0.55, 0.50, 0.44, 0.37, 0.30];
/// Delay fractions for 80, 85, … 100 % power.
const FINE: [f32; 5] = [0.30, 0.25, 0.19, 0.12, 0.00];

/// Minimum distance of the firing edge from either zero crossing.
pub const DELAY_MARGIN_US: u32 = 200;

pub const HALF_CYCLE_50HZ_US: u32 = 10_000;
pub const HALF_CYCLE_60HZ_US: u32 = 8_333;

/// Firing delay after the zero crossing for `power` percent.
pub fn phase_delay_us(power: u8, half_cycle_us: u32) -> u32 {
    let p = f32::from(power.min(100));
    let fraction = if p <= 80.0 {
        interpolate(&COARSE, p / 10.0)
    } else {
        interpolate(&FINE, (p - 80.0) / 5.0)
    };
    let delay = (fraction * half_cycle_us as f32).round() as u32;
    let max = half_cycle_us.saturating_sub(DELAY_MARGIN_US).max(DELAY_MARGIN_US);
    delay.clamp(DELAY_MARGIN_US, max)
}

fn interpolate(table: &[f32], pos: f32) -> f32 {
    let last = table.len() - 1;
    let i = (pos.floor() as usize).min(last);
    if i == last {
        return table[last];
    }
    let frac = pos - i as f32;
    table[i] + (table[i + 1] - table[i]) * frac
}

// ── Mains detection ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainsFrequency {
    Hz50,
    Hz60,
}

impl MainsFrequency {
    pub fn half_cycle_us(self) -> u32 {
        match self {
            Self::Hz50 => HALF_CYCLE_50HZ_US,
            Self::Hz60 => HALF_CYCLE_60HZ_US,
        }
    }
}

pub const MAX_ATTEMPTS: u8 = 5;
/// Zero-cross intervals averaged per attempt.
pub const SAMPLES_PER_ATTEMPT: u8 = 20;

/// Measures the mains frequency from zero-cross timestamps at boot.
///
/// The main loop polls in batches: each feed carries the number of
/// crossings since the previous one and the newest timestamp.  Each
/// attempt averages at least [`SAMPLES_PER_ATTEMPT`] half-cycle intervals.
/// A result in 48–52 Hz locks 50 Hz, 58–62 Hz locks 60 Hz; anything else
/// starts a new attempt.  After [`MAX_ATTEMPTS`] misses we assume 50 Hz.
#[derive(Debug, Clone, Default)]
pub struct MainsFrequencyDetector {
    last_us: Option<u32>,
    sum_us: u64,
    samples: u32,
    attempts: u8,
    result: Option<MainsFrequency>,
}

impl MainsFrequencyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result(&self) -> Option<MainsFrequency> {
        self.result
    }

    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Feed `crossings` new zero crossings, the newest at `timestamp_us`
    /// (free-running, may wrap).  Returns the frequency once decided.
    pub fn feed(&mut self, crossings: u32, timestamp_us: u32) -> Option<MainsFrequency> {
        if self.result.is_some() {
            return self.result;
        }
        let Some(last) = self.last_us.replace(timestamp_us) else {
            return None;
        };
        if crossings == 0 {
            return None;
        }
        self.sum_us += u64::from(timestamp_us.wrapping_sub(last));
        self.samples += crossings;
        if self.samples < u32::from(SAMPLES_PER_ATTEMPT) {
            return None;
        }

        let avg_half_cycle = self.sum_us as f32 / self.samples as f32;
        self.sum_us = 0;
        self.samples = 0;
        self.attempts += 1;

        let hz = if avg_half_cycle > 0.0 { 1_000_000.0 / (2.0 * avg_half_cycle) } else { 0.0 };
        self.result = if (48.0..=52.0).contains(&hz) {
            Some(MainsFrequency::Hz50)
        } else if (58.0..=62.0).contains(&hz) {
            Some(MainsFrequency::Hz60)
        } else if self.attempts >= MAX_ATTEMPTS {
            warn!("dimmer: mains detection failed after {} attempts ({:.1} Hz), assuming 50 Hz", self.attempts, hz);
            Some(MainsFrequency::Hz50)
        } else {
            None
        };
        if let Some(freq) = self.result {
            info!("dimmer: mains frequency {:?}", freq);
        }
        self.result
    }
}
