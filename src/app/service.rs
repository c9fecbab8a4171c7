//! Application service: the hexagonal core.
//!
//! [`MachineService`] owns the supervisor, every sub-machine, the pump and
//! heater loops and the signal conditioning in front of them.  All I/O
//! flows through port traits injected at call sites, so the whole service
//! runs against mock adapters on the host.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │        MachineService         │
//! ActuatorPort ◀──│  FSM · sub-machines · pump ·  │ ◀── ConfigPort
//!                 │  heater · filters             │
//!                 └──────────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::{Settings, keys};
use crate::control::profile::{ProfileEvent, ProfileRunner};
use crate::control::pump::{PumpController, PumpInputs};
use crate::control::temperature::{HeaterInputs, TemperatureController, emergency_stop};
use crate::drivers::dimmer::DimmerMethod;
use crate::error::{Error, ProfileError};
use crate::fsm::context::{MachineContext, SensorSnapshot};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, MachineState, safety_pass};
use crate::modes::hot_water::HotWaterRequest;
use crate::profiles::ProfileCatalog;
use crate::sensors::pressure::PressureFilter;
use crate::sensors::water_tank::WaterTankMonitor;

use super::commands::AppCommand;
use super::events::{AppEvent, MachineStatus};
use super::ports::{ActuatorPort, ConfigPort, EventSink, SensorPort};

/// Telemetry snapshots go out at most this often.
pub const TELEMETRY_INTERVAL_MS: u64 = 1_000;

// ───────────────────────────────────────────────────────────────
// MachineService
// ───────────────────────────────────────────────────────────────

pub struct MachineService {
    fsm: Fsm,
    ctx: MachineContext,

    // -- Signal conditioning --
    pressure: PressureFilter,
    /// Same EMA, applied to the modelled pump flow.
    flow: PressureFilter,
    water_tank: WaterTankMonitor,
    hot_water_request: HotWaterRequest,

    // -- Loops --
    pump: PumpController,
    runner: ProfileRunner,
    catalog: ProfileCatalog,
    heater: TemperatureController,

    last_telemetry_ms: Option<u64>,
    tick_count: u64,
}

impl MachineService {
    /// Build the service from the current parameters.
    ///
    /// Does **not** start the supervisor; call [`start`](Self::start) next.
    pub fn new(catalog: ProfileCatalog, config: &impl ConfigPort) -> Self {
        let settings = Settings::load(config);
        let mut ctx = MachineContext::new(settings);
        ctx.flags.pid_on = settings.heater.enabled;

        Self {
            fsm: Fsm::new(build_state_table(), MachineState::Init),
            ctx,
            pressure: PressureFilter::new(),
            flow: PressureFilter::new(),
            water_tank: WaterTankMonitor::new(),
            hot_water_request: HotWaterRequest::default(),
            pump: PumpController::new(),
            runner: ProfileRunner::new(),
            catalog,
            heater: TemperatureController::new(),
            last_telemetry_ms: None,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        let state = self.fsm.current_state();
        sink.emit(&AppEvent::Started(state));
        info!("machine service started in {}", state);
    }

    /// The parameter store failed to load or save.  Terminal.
    pub fn report_storage_fault(&mut self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        let from = self.fsm.current_state();
        self.fsm.force_transition(MachineState::EepromError, &mut self.ctx);
        self.apply_actuators(hw, None);
        hw.set_heater_output(0);
        if from != MachineState::EepromError {
            sink.emit(&AppEvent::StateChanged {
                from,
                to: MachineState::EepromError,
            });
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle.
    ///
    /// `hw` satisfies **both** [`SensorPort`] and [`ActuatorPort`], which
    /// avoids a double mutable borrow while keeping the port boundary
    /// explicit.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl SensorPort + ActuatorPort),
        config: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        let from = self.fsm.current_state();

        self.ctx.now_ms = now_ms;
        self.ctx.settings = Settings::load(config);
        let settings = self.ctx.settings;

        // 1–2. Sensors, conditioning, latches
        let raw = hw.read_all(now_ms);
        self.condition_sensors(now_ms, &raw, &*hw);
        let setpoint = TemperatureController::setpoint(&settings.heater, from, self.ctx.flags.steam_on);
        self.ctx.flags.emergency_stop =
            emergency_stop(self.ctx.flags.emergency_stop, self.ctx.sensors.temperature_c, setpoint);
        self.ctx.standby.update(now_ms, &settings.standby);

        // 3. Switches
        self.read_switches(now_ms, from, hw);

        // 4–5. Supervisor, then mask what the new state does not allow
        self.fsm.tick(&mut self.ctx);
        let state = self.fsm.current_state();
        safety_pass(state, &mut self.ctx);

        // 6. Pump loop
        let pump_out = self.pump.tick(
            &PumpInputs {
                now_ms,
                machine: state,
                pump_on: self.ctx.commands.pump,
                pressure_sensor: settings.sensors.pressure,
                scale_enabled: self.ctx.scale_ready(),
                pressure: self.pressure.value(),
                flow: self.flow.value(),
                brew_ms: self.ctx.brew.elapsed_ms(),
                shot_weight: self.ctx.brew.shot_weight_g(),
            },
            &settings.pump,
            &mut self.runner,
            &self.catalog,
        );

        // 7. Heater loop
        let heater_ms = self.heater.tick(
            &HeaterInputs {
                now_ms,
                machine: state,
                temperature_c: self.ctx.sensors.temperature_c,
                steam_on: self.ctx.flags.steam_on,
                brew_ms: self.ctx.brew.elapsed_ms(),
            },
            &settings.heater,
            settings.brew.pid_delay_s,
        );

        // 8. Actuators
        self.apply_actuators(hw, pump_out.map(|o| (o.power, o.method_changed.then_some(o.method))));
        hw.set_heater_output(heater_ms);

        // 9. Events
        if state != from {
            sink.emit(&AppEvent::StateChanged { from, to: state });
        }
        self.emit_sub_machine_events(pump_out.and_then(|o| o.profile_event), sink);
        if self
            .last_telemetry_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= TELEMETRY_INTERVAL_MS)
        {
            self.last_telemetry_ms = Some(now_ms);
            sink.emit(&AppEvent::Telemetry(self.status()));
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an external command.  Parameter-backed commands take effect on
    /// the next tick.
    pub fn handle_command(&mut self, cmd: AppCommand, config: &mut impl ConfigPort) -> Result<(), Error> {
        match cmd {
            AppCommand::SetBackflush(on) => {
                info!("command: backflush {}", on_off(on));
                self.ctx.flags.backflush_on = on;
            }
            AppCommand::SetSteam(on) => {
                info!("command: steam {}", on_off(on));
                self.ctx.flags.steam_on = on;
            }
            AppCommand::SetPidEnabled(on) => {
                config.set(keys::PID_ENABLED, on)?;
                info!("command: PID {}", on_off(on));
                self.ctx.flags.pid_on = on;
            }
            AppCommand::SelectProfile(index) => {
                let Some(profile) = self.catalog.get(index) else {
                    warn!("command: profile {} not in catalog ({} loaded)", index, self.catalog.len());
                    return Err(ProfileError::UnknownProfile.into());
                };
                info!("command: profile {} '{}'", index, profile.name);
                config.set(keys::DIMMER_PROFILE, index)?;
            }
            AppCommand::SetPumpMode(mode) => {
                info!("command: pump mode {:?}", mode);
                config.set(keys::DIMMER_MODE, mode.index())?;
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> MachineStatus {
        let ctx = &self.ctx;
        MachineStatus {
            state: self.fsm.current_state(),
            brew: ctx.brew.state(),
            brew_ms: ctx.brew.elapsed_ms(),
            shot_weight_g: ctx.brew.shot_weight_g(),
            flush: ctx.flush.state(),
            flush_ms: ctx.flush.elapsed_ms(),
            backflush: ctx.backflush.state(),
            backflush_cycle: ctx.backflush.cycle(),
            backflush_ms: ctx.backflush.elapsed_ms(),
            hot_water: ctx.hot_water.state(),
            pump_mode: self.pump.state().mode,
            profile_phase: self.runner.phase_index(),
            pump_power: self.pump.power(),
            pressure_bar: self.pressure.value(),
            flow_ml_s: self.flow.value(),
            weight_g: ctx.sensors.weight_g,
            temperature_c: ctx.sensors.temperature_c,
            heater_output_ms: self.heater.output_ms(),
            emergency_stop: ctx.flags.emergency_stop,
            standby_remaining_ms: ctx.standby.remaining_ms(),
        }
    }

    pub fn state(&self) -> MachineState {
        self.fsm.current_state()
    }

    /// Read-only access to the supervisor blackboard.
    pub fn context(&self) -> &MachineContext {
        &self.ctx
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    pub fn pump(&self) -> &PumpController {
        &self.pump
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn condition_sensors(&mut self, now_ms: u64, raw: &SensorSnapshot, hw: &impl ActuatorPort) {
        let settings = &self.ctx.settings;
        let sample = if settings.sensors.pressure { raw.pressure_bar } else { 0.0 };
        let pressure = self.pressure.update(sample);
        self.flow
            .update(hw.estimate_flow(pressure, &settings.pump.calibration));
        let tank_full = self
            .water_tank
            .update(now_ms, raw.water_tank_full, settings.sensors.water_tank);

        self.ctx.sensors = SensorSnapshot {
            pressure_bar: pressure,
            water_tank_full: tank_full,
            ..*raw
        };
    }

    fn read_switches(&mut self, now_ms: u64, state: MachineState, hw: &mut impl SensorPort) {
        let cfg = self.ctx.settings.switches;
        let mut switches = hw.read_switches(now_ms);
        if !cfg.brew.enabled {
            switches.brew = None;
        }
        if !cfg.hot_water.enabled {
            switches.hot_water = None;
        }
        if !cfg.steam.enabled {
            switches.steam = None;
        }
        self.ctx.switches = switches;

        // The brew switch is frozen while the tank is empty or hot water
        // owns the pump.
        if !matches!(state, MachineState::WaterTankEmpty | MachineState::HotWater) {
            if let Some(reading) = switches.brew {
                self.ctx.brew_switch.update(reading, cfg.brew.kind);
            }
        }

        self.ctx.flags.hot_water_on = self.hot_water_request.update(
            switches.hot_water,
            cfg.hot_water.kind,
            state == MachineState::PidDisabled,
        );
        if let Some(level) = switches.steam {
            self.ctx.flags.steam_on = level;
        }
    }

    fn emit_sub_machine_events(&mut self, profile: Option<ProfileEvent>, sink: &mut impl EventSink) {
        if let Some(shot) = self.ctx.brew.take_finished_shot() {
            sink.emit(&AppEvent::ShotFinished(shot));
        }
        if let Some(cycles) = self.ctx.backflush.take_finished() {
            sink.emit(&AppEvent::BackflushFinished { cycles });
        }

        match profile {
            Some(ProfileEvent::PhaseChanged(index)) => sink.emit(&AppEvent::PhaseChanged { index }),
            Some(ProfileEvent::Completed) => sink.emit(&AppEvent::ProfileCompleted),
            None => {}
        }
    }

    /// Translate the (already masked) commands into port calls.
    /// `pump` carries the dimmer power and, on the tick it changed, the
    /// new firing method.
    fn apply_actuators(
        &self,
        hw: &mut impl ActuatorPort,
        pump: Option<(u8, Option<DimmerMethod>)>,
    ) {
        let cmds = self.ctx.commands;

        if let Some((power, method)) = pump {
            if let Some(method) = method {
                hw.set_dimmer_method(method);
            }
            hw.set_pump_pressure(self.pressure.value());
            hw.set_pump_power(power);
        }

        if hw.valve_state() != cmds.valve {
            hw.set_valve(cmds.valve);
        }
        if hw.pump_state() != cmds.pump {
            hw.set_pump(cmds.pump);
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}
