//! Sensor subsystem: individual drivers and the aggregating [`SensorHub`].
//!
//! The hub reads every fitted sensor and produces a raw
//! [`SensorSnapshot`] each tick.  Conditioning (pressure smoothing, tank
//! debouncing) happens in the service with [`pressure::PressureFilter`] and
//! [`water_tank::WaterTankMonitor`], so it runs the same on every adapter.

pub mod pressure;
pub mod temperature;
pub mod water_tank;

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::fsm::context::SensorSnapshot;
use pressure::PressureTransducer;
use temperature::TemperatureSensor;
use water_tank::WaterTankSensor;

/// Latest scale reading, published by whichever task owns the scale
/// (load cell amplifier or a remote scale).  Lock-free.
pub struct ScaleCell {
    weight_bits: AtomicU32,
    connected: AtomicBool,
}

impl ScaleCell {
    pub const fn new() -> Self {
        Self {
            weight_bits: AtomicU32::new(0),
            connected: AtomicBool::new(false),
        }
    }

    pub fn publish(&self, weight_g: f32) {
        self.weight_bits.store(weight_g.to_bits(), Ordering::Release);
        self.connected.store(true, Ordering::Release);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    pub fn read(&self) -> (f32, bool) {
        let weight = f32::from_bits(self.weight_bits.load(Ordering::Acquire));
        (weight, self.connected.load(Ordering::Acquire))
    }
}

impl Default for ScaleCell {
    fn default() -> Self {
        Self::new()
    }
}

pub static SCALE: ScaleCell = ScaleCell::new();

/// Aggregates all sensor drivers and produces a unified snapshot.
pub struct SensorHub {
    pub temperature: TemperatureSensor,
    pub pressure: PressureTransducer,
    pub water_tank: WaterTankSensor,
    scale: &'static ScaleCell,
}

impl Default for SensorHub {
    fn default() -> Self {
        Self::new(
            TemperatureSensor::default(),
            PressureTransducer::default(),
            WaterTankSensor::default(),
            &SCALE,
        )
    }
}

impl SensorHub {
    pub fn new(
        temperature: TemperatureSensor,
        pressure: PressureTransducer,
        water_tank: WaterTankSensor,
        scale: &'static ScaleCell,
    ) -> Self {
        Self {
            temperature,
            pressure,
            water_tank,
            scale,
        }
    }

    /// Read every sensor and return a raw snapshot.
    ///
    /// A sensor fault is reported in the snapshot rather than as an error;
    /// the supervisor decides what to do with it.
    pub fn read_all(&mut self) -> SensorSnapshot {
        let temp = self.temperature.read();
        let (weight_g, scale_connected) = self.scale.read();

        SensorSnapshot {
            temperature_c: temp.celsius,
            temp_sensor_error: temp.fault,
            pressure_bar: self.pressure.read(),
            weight_g,
            scale_connected,
            water_tank_full: self.water_tank.is_full(),
        }
    }
}
