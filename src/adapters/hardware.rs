//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`], the switch bank and every actuator driver,
//! exposing them through [`SensorPort`] and [`ActuatorPort`].  This is the
//! only module in the system that touches actual hardware.  On non-espidf
//! targets the underlying drivers use cfg-gated simulation stubs.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::drivers::dimmer::{DimmerMethod, FlowCalibration};
use crate::drivers::heater::HeaterWindow;
use crate::drivers::pump_control::{PumpControl, PumpControlKind};
use crate::drivers::relay::Relay;
use crate::drivers::switch::Switch;
use crate::fsm::context::{SensorSnapshot, SwitchReading, SwitchReadings};
use crate::sensors::SensorHub;

/// The front-panel switches.  `None` means not fitted.
pub struct SwitchBank<I> {
    pub brew: Option<Switch<I>>,
    pub hot_water: Option<Switch<I>>,
    pub steam: Option<Switch<I>>,
}

impl<I> Default for SwitchBank<I> {
    fn default() -> Self {
        Self {
            brew: None,
            hot_water: None,
            steam: None,
        }
    }
}

fn reading<I: InputPin>(switch: &mut Switch<I>, now_ms: u64) -> SwitchReading {
    SwitchReading {
        pressed: switch.is_pressed(now_ms),
        long_press: switch.long_press_detected(now_ms),
    }
}

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<O, I> {
    sensor_hub: SensorHub,
    switches: SwitchBank<I>,
    valve: Relay<O>,
    pump: PumpControl<O>,
    heater: &'static HeaterWindow,
}

impl<O: OutputPin, I: InputPin> HardwareAdapter<O, I> {
    pub fn new(
        sensor_hub: SensorHub,
        switches: SwitchBank<I>,
        valve: Relay<O>,
        pump: PumpControl<O>,
        heater: &'static HeaterWindow,
    ) -> Self {
        Self {
            sensor_hub,
            switches,
            valve,
            pump,
            heater,
        }
    }

    /// Everything off: valve, pump, heater window.
    pub fn all_off(&mut self) {
        self.valve.off();
        self.pump.off();
        self.heater.set_output(0);
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<O: OutputPin, I: InputPin> SensorPort for HardwareAdapter<O, I> {
    fn read_all(&mut self, _now_ms: u64) -> SensorSnapshot {
        // zero crossings are sampled with the sensors until mains is known
        self.pump.poll_mains();
        self.sensor_hub.read_all()
    }

    fn read_switches(&mut self, now_ms: u64) -> SwitchReadings {
        SwitchReadings {
            brew: self.switches.brew.as_mut().map(|s| reading(s, now_ms)),
            hot_water: self.switches.hot_water.as_mut().map(|s| reading(s, now_ms)),
            steam: self.switches.steam.as_mut().map(|s| s.is_pressed(now_ms)),
        }
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<O: OutputPin, I: InputPin> ActuatorPort for HardwareAdapter<O, I> {
    fn set_valve(&mut self, on: bool) {
        self.valve.set(on);
    }

    fn valve_state(&self) -> bool {
        self.valve.state()
    }

    fn set_pump(&mut self, on: bool) {
        if on {
            self.pump.on();
        } else {
            self.pump.off();
        }
    }

    fn pump_state(&self) -> bool {
        self.pump.state()
    }

    fn pump_kind(&self) -> PumpControlKind {
        self.pump.kind()
    }

    fn set_pump_power(&mut self, power: u8) {
        self.pump.set_power(power);
    }

    fn set_pump_pressure(&mut self, bar: f32) {
        self.pump.set_pressure(bar);
    }

    fn set_dimmer_method(&mut self, method: DimmerMethod) {
        self.pump.set_control_method(method);
    }

    fn estimate_flow(&self, pressure_bar: f32, cal: &FlowCalibration) -> f32 {
        self.pump.estimate_flow(pressure_bar, cal)
    }

    fn set_heater_output(&mut self, output_ms: u32) {
        self.heater.set_output(output_ms);
    }
}
