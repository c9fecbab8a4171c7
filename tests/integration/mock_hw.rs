//! Mock hardware adapter for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO registers.  [`Rig`] wires the mock,
//! an in-memory parameter store and a recording sink to a started
//! [`MachineService`].

use brewctl::app::commands::AppCommand;
use brewctl::app::events::AppEvent;
use brewctl::app::ports::{ActuatorPort, ConfigPort, EventSink, SensorPort};
use brewctl::app::service::MachineService;
use brewctl::config::ParameterStore;
use brewctl::drivers::dimmer::{DimmerMethod, FlowCalibration};
use brewctl::drivers::pump_control::PumpControlKind;
use brewctl::fsm::MachineState;
use brewctl::fsm::context::{SensorSnapshot, SwitchReading, SwitchReadings};
use brewctl::modes::brew::LastShot;
use brewctl::profiles::ProfileCatalog;

pub const UP: SwitchReading = SwitchReading {
    pressed: false,
    long_press: false,
};
pub const DOWN: SwitchReading = SwitchReading {
    pressed: true,
    long_press: false,
};
pub const HELD: SwitchReading = SwitchReading {
    pressed: true,
    long_press: true,
};

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCall {
    Valve(bool),
    Pump(bool),
    /// Recorded only when the power level changes.
    PumpPower(u8),
    DimmerMethod(DimmerMethod),
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub calls: Vec<ActuatorCall>,
    pub sensors: SensorSnapshot,
    pub switches: SwitchReadings,
    pub kind: PumpControlKind,
    /// Flow the mock pump reports while running (mL/s).
    pub flow_when_on: f32,
    valve: bool,
    pump: bool,
    power: u8,
    pub pump_pressure: f32,
    pub heater_ms: u32,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            sensors: SensorSnapshot {
                temperature_c: 93.0,
                ..SensorSnapshot::default()
            },
            switches: SwitchReadings {
                brew: Some(UP),
                hot_water: None,
                steam: None,
            },
            kind: PumpControlKind::Relay,
            flow_when_on: 2.0,
            valve: false,
            pump: false,
            power: 0,
            pump_pressure: 0.0,
            heater_ms: 0,
        }
    }

    pub fn valve_on(&self) -> bool {
        self.valve
    }

    pub fn pump_on(&self) -> bool {
        self.pump
    }

    pub fn power(&self) -> u8 {
        self.power
    }

    pub fn set_brew(&mut self, reading: SwitchReading) {
        self.switches.brew = Some(reading);
    }

    /// Number of times the pump was switched on.
    pub fn pump_starts(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == ActuatorCall::Pump(true))
            .count()
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn read_all(&mut self, _now_ms: u64) -> SensorSnapshot {
        self.sensors
    }

    fn read_switches(&mut self, _now_ms: u64) -> SwitchReadings {
        self.switches
    }
}

impl ActuatorPort for MockHardware {
    fn set_valve(&mut self, on: bool) {
        self.valve = on;
        self.calls.push(ActuatorCall::Valve(on));
    }

    fn valve_state(&self) -> bool {
        self.valve
    }

    fn set_pump(&mut self, on: bool) {
        self.pump = on;
        self.calls.push(ActuatorCall::Pump(on));
    }

    fn pump_state(&self) -> bool {
        self.pump
    }

    fn pump_kind(&self) -> PumpControlKind {
        self.kind
    }

    fn set_pump_power(&mut self, power: u8) {
        if power != self.power {
            self.power = power;
            self.calls.push(ActuatorCall::PumpPower(power));
        }
    }

    fn set_pump_pressure(&mut self, bar: f32) {
        self.pump_pressure = bar;
    }

    fn set_dimmer_method(&mut self, method: DimmerMethod) {
        self.calls.push(ActuatorCall::DimmerMethod(method));
    }

    fn estimate_flow(&self, _pressure_bar: f32, _cal: &FlowCalibration) -> f32 {
        if self.pump { self.flow_when_on } else { 0.0 }
    }

    fn set_heater_output(&mut self, output_ms: u32) {
        self.heater_ms = output_ms;
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn transitions(&self) -> Vec<(MachineState, MachineState)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::StateChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn shots(&self) -> Vec<LastShot> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::ShotFinished(shot) => Some(*shot),
                _ => None,
            })
            .collect()
    }

    pub fn backflush_runs(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::BackflushFinished { cycles } => Some(*cycles),
                _ => None,
            })
            .collect()
    }

    pub fn profile_completions(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::ProfileCompleted))
            .count()
    }

    pub fn phases(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::PhaseChanged { index } => Some(*index),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// Control tick used by the scenario tests.
pub const TICK_MS: u64 = 100;

pub struct Rig {
    pub service: MachineService,
    pub hw: MockHardware,
    pub params: ParameterStore,
    pub sink: RecordingSink,
    pub now_ms: u64,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::with_params(ParameterStore::defaults())
    }

    pub fn with_params(params: ParameterStore) -> Self {
        Self::with_catalog(params, ProfileCatalog::builtin().expect("builtin catalog"))
    }

    /// Start from `params` and run one tick so Init has resolved.
    pub fn with_catalog(params: ParameterStore, catalog: ProfileCatalog) -> Self {
        let mut rig = Self::unbooted(params, catalog);
        rig.tick();
        rig
    }

    /// Started service, no tick run yet.
    pub fn unbooted(params: ParameterStore, catalog: ProfileCatalog) -> Self {
        let mut sink = RecordingSink::default();
        let mut service = MachineService::new(catalog, &params);
        service.start(&mut sink);
        Self {
            service,
            hw: MockHardware::new(),
            params,
            sink,
            now_ms: 0,
        }
    }

    pub fn set<T: serde::Serialize>(&mut self, path: &str, value: T) {
        self.params.set(path, value).expect("parameter path");
    }

    pub fn command(&mut self, cmd: AppCommand) {
        self.service
            .handle_command(cmd, &mut self.params)
            .expect("command accepted");
    }

    pub fn state(&self) -> MachineState {
        self.service.state()
    }

    pub fn tick(&mut self) {
        self.service
            .tick(self.now_ms, &mut self.hw, &self.params, &mut self.sink);
    }

    /// Advance the clock by one tick and run it.
    pub fn step(&mut self) {
        self.now_ms += TICK_MS;
        self.tick();
    }

    /// Run ticks until `ms` more milliseconds have passed.
    pub fn run_for(&mut self, ms: u64) {
        let end = self.now_ms + ms;
        while self.now_ms < end {
            self.step();
        }
    }

    /// Toggle-style press: switch on, then one tick.
    pub fn press(&mut self) {
        self.hw.set_brew(DOWN);
        self.step();
    }

    pub fn release(&mut self) {
        self.hw.set_brew(UP);
        self.step();
    }
}
