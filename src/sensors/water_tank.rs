//! Water tank level: optical sensor read plus a read-count debouncer.
//!
//! The sensor output is HIGH while water is present.  The level is only
//! sampled every 200 ms and a change is accepted after three identical
//! consecutive samples, so sloshing during a shot does not trip the
//! supervisor into `WaterTankEmpty`.

use log::info;

use crate::drivers::hw_init;
use crate::pins;

pub const CHECK_INTERVAL_MS: u64 = 200;
pub const STABLE_READS: u8 = 3;

pub struct WaterTankSensor {
    gpio: u8,
}

impl Default for WaterTankSensor {
    fn default() -> Self {
        Self::new(pins::WATER_TANK_GPIO)
    }
}

impl WaterTankSensor {
    pub fn new(gpio: u8) -> Self {
        Self { gpio }
    }

    pub fn is_full(&self) -> bool {
        hw_init::gpio_read(i32::from(self.gpio))
    }
}

#[derive(Debug, Clone)]
pub struct WaterTankMonitor {
    full: bool,
    candidate: bool,
    count: u8,
    last_check_ms: Option<u64>,
}

impl Default for WaterTankMonitor {
    fn default() -> Self {
        Self {
            full: true,
            candidate: true,
            count: 0,
            last_check_ms: None,
        }
    }
}

impl WaterTankMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Feed the raw level.  A disabled sensor always reads full.
    pub fn update(&mut self, now_ms: u64, raw_full: bool, enabled: bool) -> bool {
        if !enabled {
            self.full = true;
            self.count = 0;
            return true;
        }

        if self
            .last_check_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < CHECK_INTERVAL_MS)
        {
            return self.full;
        }
        self.last_check_ms = Some(now_ms);

        if raw_full != self.candidate {
            self.candidate = raw_full;
            self.count = 1;
        } else {
            self.count = self.count.saturating_add(1);
        }

        if self.count >= STABLE_READS && self.candidate != self.full {
            self.full = self.candidate;
            info!("water tank: {}", if self.full { "full" } else { "empty" });
        }
        self.full
    }
}
