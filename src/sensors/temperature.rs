//! Boiler temperature sensor (PT1000 behind a linear amplifier).
//!
//! The front end maps 0–200 °C onto 0.2–3.0 V at the ADC pin.  Readings
//! pinned to either rail mean an open or shorted sensor and are reported as
//! a fault; the supervisor latches that into `SensorError`.
//!
//! Reads go through `hw_init::adc1_read`, which is a simulation bank on
//! host targets.

use log::warn;

use crate::drivers::hw_init;
use crate::pins;

const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;
const V_AT_0C: f32 = 0.2;
const V_AT_200C: f32 = 3.0;
/// Raw counts closer than this to either rail are treated as a sensor fault.
const RAIL_MARGIN: u16 = 40;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    pub raw: u16,
    pub celsius: f32,
    pub fault: bool,
}

pub struct TemperatureSensor {
    channel: u32,
    last_celsius: f32,
    fault_logged: bool,
}

impl Default for TemperatureSensor {
    fn default() -> Self {
        Self::new(pins::TEMPERATURE_ADC_CHANNEL)
    }
}

impl TemperatureSensor {
    pub fn new(channel: u32) -> Self {
        Self {
            channel,
            last_celsius: 0.0,
            fault_logged: false,
        }
    }

    /// Read the sensor.  A faulted read keeps the last good temperature.
    pub fn read(&mut self) -> TemperatureReading {
        let raw = hw_init::adc1_read(self.channel);
        let fault = raw < RAIL_MARGIN || raw > ADC_MAX as u16 - RAIL_MARGIN;

        if fault {
            if !self.fault_logged {
                warn!("temperature: sensor fault (raw={})", raw);
                self.fault_logged = true;
            }
        } else {
            self.fault_logged = false;
            self.last_celsius = raw_to_celsius(raw);
        }

        TemperatureReading {
            raw,
            celsius: self.last_celsius,
            fault,
        }
    }
}

pub fn raw_to_celsius(raw: u16) -> f32 {
    let voltage = raw as f32 / ADC_MAX * V_REF;
    (voltage - V_AT_0C) / (V_AT_200C - V_AT_0C) * 200.0
}
