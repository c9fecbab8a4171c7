//! End-to-end shot timelines through the full service tick.

use brewctl::app::commands::AppCommand;
use brewctl::app::ports::ConfigPort;
use brewctl::config::{ParameterStore, keys};
use brewctl::control::pump::PumpMode;
use brewctl::fsm::MachineState;
use brewctl::modes::brew::BrewState;
use brewctl::profiles::ProfileCatalog;

use crate::mock_hw::{ActuatorCall, DOWN, Rig};

fn assert_outputs(rig: &Rig, valve: bool, pump: bool, at: &str) {
    assert_eq!(rig.hw.valve_on(), valve, "valve at {at}");
    assert_eq!(rig.hw.pump_on(), pump, "pump at {at}");
}

// ── Toggle switch, brew by time with pre-infusion ─────────────

#[test]
fn timed_shot_with_preinfusion() {
    let mut rig = Rig::new();
    assert_eq!(rig.state(), MachineState::PidNormal);

    rig.press();
    let t0 = rig.now_ms;
    assert_eq!(rig.state(), MachineState::Brew);
    assert_eq!(rig.service.context().brew.state(), BrewState::Preinfusion);
    assert_outputs(&rig, true, true, "start");

    rig.run_for(1_900);
    assert_outputs(&rig, true, true, "1.9 s");

    rig.step();
    assert_eq!(rig.service.context().brew.state(), BrewState::PreinfusionPause);
    assert_outputs(&rig, true, false, "2 s");

    rig.run_for(4_900);
    assert_outputs(&rig, true, false, "6.9 s");

    rig.step();
    assert_eq!(rig.service.context().brew.state(), BrewState::Running);
    assert_outputs(&rig, true, true, "7 s");

    rig.run_for(24_900);
    assert_eq!(rig.now_ms - t0, 31_900);
    assert_eq!(rig.state(), MachineState::Brew);

    rig.step();
    assert_eq!(rig.state(), MachineState::PidNormal);
    assert_outputs(&rig, false, false, "32 s");

    let shots = rig.sink.shots();
    assert_eq!(shots.len(), 1);
    assert_eq!(shots[0].duration_ms, 32_000);
    assert_eq!(shots[0].weight_g, None);
    assert_eq!(
        rig.sink.transitions(),
        vec![
            (MachineState::Init, MachineState::PidNormal),
            (MachineState::PidNormal, MachineState::Brew),
            (MachineState::Brew, MachineState::PidNormal),
        ]
    );
}

#[test]
fn toggle_left_on_does_not_start_a_second_shot() {
    let mut rig = Rig::new();
    rig.press();
    rig.run_for(40_000);
    assert_eq!(rig.state(), MachineState::PidNormal);
    assert_eq!(rig.sink.shots().len(), 1);

    // still on: nothing happens
    rig.run_for(5_000);
    assert_eq!(rig.state(), MachineState::PidNormal);
    assert!(!rig.hw.pump_on());

    rig.release();
    rig.press();
    assert_eq!(rig.state(), MachineState::Brew);
}

#[test]
fn switching_off_ends_the_shot_early() {
    let mut rig = Rig::new();
    rig.press();
    rig.run_for(10_000);
    assert_eq!(rig.service.context().brew.state(), BrewState::Running);

    rig.release();
    assert_eq!(rig.state(), MachineState::PidNormal);
    assert_outputs(&rig, false, false, "release");

    let shots = rig.sink.shots();
    assert_eq!(shots.len(), 1);
    assert_eq!(shots[0].duration_ms, 10_100);
}

#[test]
fn switch_on_at_boot_needs_a_release_first() {
    let catalog = ProfileCatalog::builtin().unwrap();
    let mut rig = Rig::unbooted(ParameterStore::defaults(), catalog);
    rig.hw.set_brew(DOWN);
    rig.tick();
    rig.run_for(2_000);
    assert_eq!(rig.state(), MachineState::PidNormal);
    assert_eq!(rig.hw.pump_starts(), 0);

    rig.release();
    rig.press();
    assert_eq!(rig.state(), MachineState::Brew);
}

// ── Brew by weight ────────────────────────────────────────────

#[test]
fn weight_target_ends_the_shot() {
    let mut params = ParameterStore::defaults();
    params.set(keys::SCALE_ENABLED, true).unwrap();
    params.set(keys::BREW_BY_WEIGHT_ENABLED, true).unwrap();
    params.set(keys::BREW_TARGET_WEIGHT, 36.0).unwrap();
    let mut rig = Rig::with_params(params);
    rig.hw.sensors.scale_connected = true;
    rig.hw.sensors.weight_g = 100.0;

    rig.press();
    rig.run_for(9_900);
    assert_eq!(rig.state(), MachineState::Brew);

    rig.hw.sensors.weight_g = 140.0;
    rig.step();
    assert_eq!(rig.state(), MachineState::PidNormal);

    let shot = rig.sink.shots()[0];
    assert_eq!(shot.duration_ms, 10_000);
    let weight = shot.weight_g.expect("scale in use");
    assert!((weight - 40.0).abs() < 1e-3);
}

#[test]
fn time_target_wins_over_a_distant_weight_target() {
    let mut params = ParameterStore::defaults();
    params.set(keys::SCALE_ENABLED, true).unwrap();
    params.set(keys::BREW_BY_WEIGHT_ENABLED, true).unwrap();
    params.set(keys::BREW_TARGET_WEIGHT, 36.0).unwrap();
    let mut rig = Rig::with_params(params);
    rig.hw.sensors.scale_connected = true;
    rig.hw.sensors.weight_g = 100.0;

    rig.press();
    let t0 = rig.now_ms;
    // 0.5 g/s: nowhere near 36 g when the 32 s time target fires
    while rig.state() == MachineState::Brew && rig.now_ms - t0 < 40_000 {
        rig.hw.sensors.weight_g += 0.05;
        rig.step();
    }

    assert_eq!(rig.state(), MachineState::PidNormal);
    let shot = rig.sink.shots()[0];
    assert_eq!(shot.duration_ms, 32_000);
    let weight = shot.weight_g.expect("scale in use");
    assert!((weight - 16.0).abs() < 0.05, "weight {weight}");
}

#[test]
fn weight_is_ignored_without_a_scale() {
    let mut params = ParameterStore::defaults();
    params.set(keys::BREW_BY_WEIGHT_ENABLED, true).unwrap();
    let mut rig = Rig::with_params(params);
    rig.hw.sensors.weight_g = 500.0;

    rig.press();
    rig.run_for(20_000);
    assert_eq!(rig.state(), MachineState::Brew);
}

// ── Contactor mode ────────────────────────────────────────────

#[test]
fn contactor_mode_only_times_the_shot() {
    let mut params = ParameterStore::defaults();
    params.set(keys::BREW_MODE, 0).unwrap();
    let mut rig = Rig::with_params(params);

    rig.press();
    assert_eq!(rig.state(), MachineState::Brew);
    assert_eq!(rig.service.context().brew.state(), BrewState::Running);

    rig.run_for(60_000);
    assert_eq!(rig.state(), MachineState::Brew, "no time target in contactor mode");

    rig.release();
    assert_eq!(rig.state(), MachineState::PidNormal);
    assert_eq!(rig.hw.pump_starts(), 0);
    assert!(rig.hw.calls.iter().all(|c| *c != ActuatorCall::Valve(true)));
    assert_eq!(rig.sink.shots()[0].duration_ms, 60_100);
}

// ── Momentary switch ──────────────────────────────────────────

#[test]
fn momentary_short_press_starts_and_second_press_stops() {
    let mut params = ParameterStore::defaults();
    params.set("hardware.switches.brew.type", 1).unwrap();
    let mut rig = Rig::with_params(params);

    rig.press();
    assert_eq!(rig.state(), MachineState::PidNormal, "press alone is not a short press");
    rig.release();
    assert_eq!(rig.state(), MachineState::Brew);

    rig.run_for(3_000);
    rig.press();
    assert_eq!(rig.state(), MachineState::Brew, "stop waits for the release");
    rig.release();
    assert_eq!(rig.state(), MachineState::PidNormal);
    assert_outputs(&rig, false, false, "stopped");
}

// ── Profile phases ────────────────────────────────────────────

const TIMED_PROFILE: &str = r#"[
    {
        "name": "Three Step",
        "shortname": "threeStep",
        "phases": [
            { "name": "soak", "flow": 2, "seconds": 2, "pump": "flow" },
            { "name": "ramp", "pressure": 9, "seconds": 3, "transition": "smooth" },
            { "name": "hold", "pressure": 9, "seconds": 60 }
        ]
    }
]"#;

#[test]
fn profile_phases_are_reported_in_order() {
    let mut params = ParameterStore::defaults();
    params.set(keys::DIMMER_ENABLED, true).unwrap();
    params.set(keys::PRESSURE_SENSOR_ENABLED, true).unwrap();
    params.set(keys::PREINFUSION_ENABLED, false).unwrap();
    let catalog = ProfileCatalog::from_json(TIMED_PROFILE).unwrap();
    let mut rig = Rig::with_catalog(params, catalog);
    rig.command(AppCommand::SetPumpMode(PumpMode::Profile));

    rig.press();
    assert_eq!(rig.state(), MachineState::Brew);
    rig.run_for(10_000);

    assert_eq!(rig.sink.phases(), vec![0, 1, 2]);
    assert_eq!(rig.service.status().profile_phase, 2);
    assert!(rig.hw.power() > 0, "pressure loop drives the pump");
}

const SHORT_PROFILE: &str = r#"[
    {
        "name": "Short",
        "shortname": "short",
        "phases": [
            { "name": "soak", "pressure": 3, "seconds": 1 },
            { "name": "hold", "pressure": 9, "seconds": 2 }
        ]
    }
]"#;

#[test]
fn profile_completion_is_reported_once() {
    let mut params = ParameterStore::defaults();
    params.set(keys::DIMMER_ENABLED, true).unwrap();
    params.set(keys::PRESSURE_SENSOR_ENABLED, true).unwrap();
    params.set(keys::PREINFUSION_ENABLED, false).unwrap();
    let catalog = ProfileCatalog::from_json(SHORT_PROFILE).unwrap();
    let mut rig = Rig::with_catalog(params, catalog);
    rig.command(AppCommand::SetPumpMode(PumpMode::Profile));

    rig.press();
    rig.run_for(2_900);
    assert_eq!(rig.sink.profile_completions(), 0);

    rig.run_for(2_000);
    assert_eq!(rig.sink.phases(), vec![0, 1]);
    assert_eq!(rig.sink.profile_completions(), 1);
    // the shot itself runs on to its time target
    assert_eq!(rig.state(), MachineState::Brew);

    rig.run_for(30_000);
    assert_eq!(rig.state(), MachineState::PidNormal);
    assert_eq!(rig.sink.profile_completions(), 1);
}

#[test]
fn profile_without_pressure_sensor_reports_no_phases() {
    let mut params = ParameterStore::defaults();
    params.set(keys::DIMMER_ENABLED, true).unwrap();
    let catalog = ProfileCatalog::from_json(TIMED_PROFILE).unwrap();
    let mut rig = Rig::with_catalog(params, catalog);
    rig.command(AppCommand::SetPumpMode(PumpMode::Profile));

    rig.press();
    rig.run_for(10_000);
    assert!(rig.sink.phases().is_empty());
    assert_eq!(rig.sink.profile_completions(), 0);
    assert_eq!(rig.service.status().pump_mode, PumpMode::Power);
    assert_eq!(rig.hw.power(), 100);
}
