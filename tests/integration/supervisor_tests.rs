//! Supervisor priorities, fault latches and exclusivity, end to end.

use brewctl::app::commands::AppCommand;
use brewctl::app::ports::ConfigPort;
use brewctl::config::{ParameterStore, keys};
use brewctl::fsm::MachineState;
use brewctl::modes::manual_flush::FlushState;

use crate::mock_hw::{DOWN, HELD, Rig, UP};

// ── Water tank ────────────────────────────────────────────────

fn rig_with_tank_sensor() -> Rig {
    let mut params = ParameterStore::defaults();
    params.set(keys::WATER_TANK_SENSOR_ENABLED, true).unwrap();
    Rig::with_params(params)
}

#[test]
fn empty_tank_blocks_brewing() {
    let mut rig = rig_with_tank_sensor();
    rig.hw.sensors.water_tank_full = false;
    rig.run_for(1_000);
    assert_eq!(rig.state(), MachineState::WaterTankEmpty);
    assert_eq!(rig.hw.heater_ms, 0);

    rig.press();
    rig.run_for(2_000);
    assert_eq!(rig.state(), MachineState::WaterTankEmpty);
    assert_eq!(rig.hw.pump_starts(), 0);

    rig.release();
    rig.hw.sensors.water_tank_full = true;
    rig.run_for(1_000);
    assert_eq!(rig.state(), MachineState::PidNormal);
    assert_eq!(rig.hw.pump_starts(), 0);
}

#[test]
fn tank_slosh_is_debounced() {
    let mut rig = rig_with_tank_sensor();
    for _ in 0..10 {
        rig.hw.sensors.water_tank_full = false;
        rig.run_for(200);
        rig.hw.sensors.water_tank_full = true;
        rig.run_for(200);
    }
    assert_eq!(rig.state(), MachineState::PidNormal);
}

#[test]
fn tank_running_dry_mid_shot_lets_the_shot_finish() {
    let mut rig = rig_with_tank_sensor();
    rig.press();
    rig.hw.sensors.water_tank_full = false;
    rig.run_for(2_000);
    // brew ignores the tank; only the heater-path states check it
    assert_eq!(rig.state(), MachineState::Brew);

    rig.run_for(31_000);
    assert_eq!(rig.state(), MachineState::WaterTankEmpty);
    assert_eq!(rig.sink.shots().len(), 1);
}

// ── Over-temperature ──────────────────────────────────────────

#[test]
fn over_temperature_latches_until_cooled() {
    let mut rig = Rig::new();
    assert!(rig.hw.heater_ms > 0, "heating below setpoint");

    rig.hw.sensors.temperature_c = 150.0;
    rig.step();
    assert_eq!(rig.state(), MachineState::EmergencyStop);
    assert_eq!(rig.hw.heater_ms, 0);
    assert!(rig.service.status().emergency_stop);

    // below the trip point but not yet below setpoint + margin
    rig.hw.sensors.temperature_c = 120.0;
    rig.run_for(2_000);
    assert_eq!(rig.state(), MachineState::EmergencyStop);

    rig.hw.sensors.temperature_c = 96.0;
    rig.step();
    assert_eq!(rig.state(), MachineState::PidNormal);
}

#[test]
fn over_temperature_aborts_a_shot() {
    let mut rig = Rig::new();
    rig.press();
    rig.run_for(3_000);
    assert!(rig.hw.pump_on());

    rig.hw.sensors.temperature_c = 146.0;
    rig.step();
    assert_eq!(rig.state(), MachineState::EmergencyStop);
    assert!(!rig.hw.valve_on() && !rig.hw.pump_on());
    assert_eq!(rig.sink.shots().len(), 1);
    assert!(!rig.service.context().brew.is_active());
}

// ── Terminal faults ───────────────────────────────────────────

#[test]
fn sensor_fault_is_terminal() {
    let mut rig = Rig::new();
    rig.hw.sensors.temp_sensor_error = true;
    rig.step();
    assert_eq!(rig.state(), MachineState::SensorError);

    rig.hw.sensors.temp_sensor_error = false;
    rig.press();
    rig.run_for(5_000);
    assert_eq!(rig.state(), MachineState::SensorError);
    assert_eq!(rig.hw.pump_starts(), 0);
    assert_eq!(rig.hw.heater_ms, 0);
}

#[test]
fn sensor_fault_mid_shot_stops_everything() {
    let mut rig = Rig::new();
    rig.press();
    rig.run_for(1_000);
    rig.hw.sensors.temp_sensor_error = true;
    rig.step();
    assert_eq!(rig.state(), MachineState::SensorError);
    assert!(!rig.hw.valve_on() && !rig.hw.pump_on());
}

#[test]
fn storage_fault_is_terminal() {
    let mut rig = Rig::new();
    rig.service.report_storage_fault(&mut rig.hw, &mut rig.sink);
    assert_eq!(rig.state(), MachineState::EepromError);
    assert!(
        rig.sink
            .transitions()
            .contains(&(MachineState::PidNormal, MachineState::EepromError))
    );

    rig.press();
    rig.run_for(2_000);
    assert_eq!(rig.state(), MachineState::EepromError);
    assert_eq!(rig.hw.pump_starts(), 0);
}

// ── PID, steam, standby ───────────────────────────────────────

#[test]
fn pid_command_round_trip() {
    let mut rig = Rig::new();
    rig.command(AppCommand::SetPidEnabled(false));
    rig.step();
    assert_eq!(rig.state(), MachineState::PidDisabled);
    assert_eq!(rig.hw.heater_ms, 0);

    rig.press();
    assert_eq!(rig.state(), MachineState::PidDisabled, "no brewing without PID");

    rig.command(AppCommand::SetPidEnabled(true));
    rig.step();
    assert_eq!(rig.state(), MachineState::PidNormal);
}

#[test]
fn steam_never_runs_the_pump_on_its_own() {
    let mut rig = Rig::new();
    rig.command(AppCommand::SetSteam(true));
    rig.step();
    assert_eq!(rig.state(), MachineState::Steam);

    rig.press();
    rig.run_for(2_000);
    assert_eq!(rig.state(), MachineState::Steam);
    assert_eq!(rig.hw.pump_starts(), 0);

    rig.command(AppCommand::SetSteam(false));
    rig.step();
    assert_eq!(rig.state(), MachineState::PidNormal);
}

#[test]
fn standby_after_timeout_and_brew_wakes_it() {
    let mut params = ParameterStore::defaults();
    params.set(keys::STANDBY_ENABLED, true).unwrap();
    params.set(keys::STANDBY_TIME, 0.05).unwrap();
    let mut rig = Rig::with_params(params);

    rig.run_for(5_000);
    assert_eq!(rig.state(), MachineState::Standby);
    assert!(!rig.service.context().flags.pid_on);
    assert_eq!(rig.hw.heater_ms, 0);

    rig.press();
    assert_eq!(rig.state(), MachineState::Brew);
    assert!(rig.service.context().flags.pid_on);
    assert!(rig.service.status().standby_remaining_ms > 0);
}

// ── Manual flush and hot water ────────────────────────────────

fn momentary_rig() -> Rig {
    let mut params = ParameterStore::defaults();
    params.set("hardware.switches.brew.type", 1).unwrap();
    params.set("hardware.switches.hot_water.enabled", true).unwrap();
    params.set("hardware.switches.hot_water.type", 1).unwrap();
    let mut rig = Rig::with_params(params);
    rig.hw.switches.hot_water = Some(UP);
    rig.step();
    rig
}

#[test]
fn long_press_flushes_until_release() {
    let mut rig = momentary_rig();
    rig.press();
    rig.hw.set_brew(HELD);
    rig.step();
    assert_eq!(rig.state(), MachineState::ManualFlush);
    assert!(rig.hw.valve_on() && rig.hw.pump_on());

    rig.run_for(4_000);
    assert_eq!(rig.service.context().flush.state(), FlushState::Running);
    assert!(rig.service.status().flush_ms >= 3_900);

    rig.release();
    assert_eq!(rig.state(), MachineState::PidNormal);
    assert!(!rig.hw.valve_on() && !rig.hw.pump_on());
    assert!(rig.sink.shots().is_empty(), "a flush is not a shot");
}

#[test]
fn hot_water_runs_the_pump_without_the_valve() {
    let mut rig = momentary_rig();
    rig.hw.switches.hot_water = Some(DOWN);
    rig.step();
    assert_eq!(rig.state(), MachineState::HotWater);
    assert!(rig.hw.pump_on());
    assert!(!rig.hw.valve_on());

    // momentary: a second press toggles the request off
    rig.hw.switches.hot_water = Some(UP);
    rig.step();
    assert_eq!(rig.state(), MachineState::HotWater);
    rig.hw.switches.hot_water = Some(DOWN);
    rig.step();
    assert_eq!(rig.state(), MachineState::PidNormal);
    assert!(!rig.hw.pump_on());
}

#[test]
fn only_one_water_path_at_a_time() {
    let mut rig = momentary_rig();
    rig.press();
    rig.release();
    assert_eq!(rig.state(), MachineState::Brew);

    for i in 0..100 {
        let level = if i % 7 < 3 { DOWN } else { UP };
        rig.hw.switches.hot_water = Some(level);
        rig.step();
        assert!(rig.service.context().running_count() <= 1);
        if rig.service.context().brew.is_active() {
            assert_eq!(rig.state(), MachineState::Brew);
        }
    }
    assert!(!rig.service.context().hot_water.is_running());
}
