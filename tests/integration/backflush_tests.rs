//! Backflush cleaning runs driven through the service.

use brewctl::app::commands::AppCommand;
use brewctl::app::ports::ConfigPort;
use brewctl::config::{ParameterStore, keys};
use brewctl::fsm::MachineState;
use brewctl::modes::backflush::BackflushState;

use crate::mock_hw::{ActuatorCall, Rig};

fn rig_with_cycles(cycles: i32) -> Rig {
    let mut params = ParameterStore::defaults();
    params.set(keys::BACKFLUSH_CYCLES, cycles).unwrap();
    let mut rig = Rig::with_params(params);
    rig.command(AppCommand::SetBackflush(true));
    rig.step();
    rig
}

#[test]
fn flag_alone_enters_backflush_without_running() {
    let mut rig = rig_with_cycles(3);
    assert_eq!(rig.state(), MachineState::Backflush);

    rig.run_for(5_000);
    assert_eq!(rig.service.context().backflush.state(), BackflushState::Idle);
    assert_eq!(rig.hw.pump_starts(), 0);
}

#[test]
fn three_cycles_then_report() {
    let mut rig = rig_with_cycles(3);

    rig.press();
    let t0 = rig.now_ms;
    assert_eq!(rig.service.context().backflush.state(), BackflushState::Filling);
    assert!(rig.hw.valve_on() && rig.hw.pump_on());

    rig.run_for(5_000);
    assert_eq!(rig.service.context().backflush.state(), BackflushState::Flushing);
    assert!(!rig.hw.valve_on() && !rig.hw.pump_on());

    rig.run_for(10_000);
    assert_eq!(rig.service.context().backflush.cycle(), 2);
    assert_eq!(rig.service.context().backflush.state(), BackflushState::Filling);

    let end = t0 + 45_000;
    while rig.now_ms < end - 100 {
        rig.step();
        assert!(rig.sink.backflush_runs().is_empty(), "finished early at {}", rig.now_ms);
    }
    rig.step();

    assert_eq!(rig.sink.backflush_runs(), vec![3]);
    assert_eq!(rig.service.context().backflush.state(), BackflushState::Idle);
    assert_eq!(rig.service.context().backflush.cycle(), 1);
    assert_eq!(rig.hw.pump_starts(), 3);
    let valve_opens = rig
        .hw
        .calls
        .iter()
        .filter(|c| **c == ActuatorCall::Valve(true))
        .count();
    assert_eq!(valve_opens, 3);

    // stays put while the flag is on
    rig.run_for(5_000);
    assert_eq!(rig.state(), MachineState::Backflush);
    assert_eq!(rig.hw.pump_starts(), 3);

    rig.command(AppCommand::SetBackflush(false));
    rig.step();
    assert_eq!(rig.state(), MachineState::PidNormal);
}

#[test]
fn clearing_the_flag_mid_cycle_stops_everything() {
    let mut rig = rig_with_cycles(5);
    rig.press();
    rig.run_for(2_000);
    assert!(rig.hw.pump_on());

    rig.command(AppCommand::SetBackflush(false));
    rig.step();

    assert_eq!(rig.state(), MachineState::PidNormal);
    assert!(!rig.hw.valve_on() && !rig.hw.pump_on());
    assert_eq!(rig.service.context().backflush.state(), BackflushState::Idle);
    assert_eq!(rig.sink.backflush_runs(), vec![1]);
}

#[test]
fn switch_off_aborts_the_run() {
    let mut rig = rig_with_cycles(5);
    rig.press();
    rig.run_for(12_000);

    rig.release();
    assert_eq!(rig.service.context().backflush.state(), BackflushState::Idle);
    assert!(!rig.hw.pump_on());
    assert_eq!(rig.state(), MachineState::Backflush);
}

#[test]
fn zero_cycles_never_starts() {
    let mut rig = rig_with_cycles(0);
    rig.press();
    rig.run_for(3_000);
    assert_eq!(rig.service.context().backflush.state(), BackflushState::Idle);
    assert_eq!(rig.hw.pump_starts(), 0);
}

#[test]
fn backflush_flag_blocks_brewing() {
    let mut rig = rig_with_cycles(1);
    rig.press();
    assert_eq!(rig.state(), MachineState::Backflush);
    assert!(!rig.service.context().brew.is_active());
    assert_eq!(rig.service.context().backflush.state(), BackflushState::Filling);
}
