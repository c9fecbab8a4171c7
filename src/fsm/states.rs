//! Concrete supervisor handlers and table builder.
//!
//! Each handler checks its exit conditions in priority order (first match
//! wins) and only then polls the sub-machine it owns.
//!
//! ```text
//!  INIT ──▶ PID_NORMAL ──[backflush flag]──▶ BACKFLUSH
//!              │  ▲ ──[brew active]────────▶ BREW
//!              │  │ ──[flush active]───────▶ MANUAL_FLUSH
//!              │  │ ──[hot water running]──▶ HOT_WATER
//!              │  │ ──[steam flag]─────────▶ STEAM ──[flag off, draw running]──▶ HOT_WATER
//!              │  └──────[done / cleared]──────┘
//!              └──[timeout]──▶ STANDBY ──[wake]──▶ ...
//!
//!  Any state ──[sensor fault]──▶ SENSOR_ERROR (terminal)
//!  Most states ──[tank empty | PID off | over-temp]──▶ WATER_TANK_EMPTY | PID_DISABLED | EMERGENCY_STOP
//! ```

use super::context::{ActuatorCommands, MachineContext};
use super::{MachineState, StateDescriptor};
use log::{error, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; MachineState::COUNT] {
    [
        StateDescriptor {
            id: MachineState::Init,
            name: "Init",
            on_enter: Some(init_enter),
            on_exit: None,
            on_update: init_update,
        },
        StateDescriptor {
            id: MachineState::PidNormal,
            name: "PID Normal",
            on_enter: None,
            on_exit: None,
            on_update: pid_normal_update,
        },
        StateDescriptor {
            id: MachineState::Brew,
            name: "Brew",
            on_enter: Some(activity_enter),
            on_exit: Some(brew_exit),
            on_update: brew_update,
        },
        StateDescriptor {
            id: MachineState::ManualFlush,
            name: "Manual Flush",
            on_enter: Some(activity_enter),
            on_exit: Some(manual_flush_exit),
            on_update: manual_flush_update,
        },
        StateDescriptor {
            id: MachineState::HotWater,
            name: "Hot Water",
            on_enter: Some(activity_enter),
            on_exit: Some(hot_water_exit),
            on_update: hot_water_update,
        },
        StateDescriptor {
            id: MachineState::Steam,
            name: "Steam",
            on_enter: Some(activity_enter),
            on_exit: None,
            on_update: steam_update,
        },
        StateDescriptor {
            id: MachineState::Backflush,
            name: "Backflush",
            on_enter: Some(activity_enter),
            on_exit: Some(backflush_exit),
            on_update: backflush_update,
        },
        StateDescriptor {
            id: MachineState::WaterTankEmpty,
            name: "Water Tank Empty",
            on_enter: Some(water_tank_empty_enter),
            on_exit: None,
            on_update: water_tank_empty_update,
        },
        StateDescriptor {
            id: MachineState::EmergencyStop,
            name: "Emergency Stop",
            on_enter: Some(emergency_stop_enter),
            on_exit: None,
            on_update: emergency_stop_update,
        },
        StateDescriptor {
            id: MachineState::PidDisabled,
            name: "PID Disabled",
            on_enter: None,
            on_exit: None,
            on_update: pid_disabled_update,
        },
        StateDescriptor {
            id: MachineState::Standby,
            name: "Standby Mode",
            on_enter: Some(standby_enter),
            on_exit: Some(standby_exit),
            on_update: standby_update,
        },
        StateDescriptor {
            id: MachineState::SensorError,
            name: "Sensor Error",
            on_enter: Some(fault_enter),
            on_exit: None,
            on_update: terminal_update,
        },
        StateDescriptor {
            id: MachineState::EepromError,
            name: "EEPROM Error",
            on_enter: Some(fault_enter),
            on_exit: None,
            on_update: terminal_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared guards
// ═══════════════════════════════════════════════════════════════════════════

fn sensor_error(ctx: &MachineContext) -> bool {
    ctx.sensors.temp_sensor_error
}

fn tank_empty(ctx: &MachineContext) -> bool {
    !ctx.sensors.water_tank_full
}

fn pid_off(ctx: &MachineContext) -> bool {
    !ctx.flags.pid_on
}

/// SensorError, PidDisabled, EmergencyStop: the common head of the
/// brew-path priority lists.
fn brew_path_faults(ctx: &MachineContext) -> Option<MachineState> {
    if sensor_error(ctx) {
        return Some(MachineState::SensorError);
    }
    if pid_off(ctx) {
        return Some(MachineState::PidDisabled);
    }
    if ctx.flags.emergency_stop {
        return Some(MachineState::EmergencyStop);
    }
    None
}

/// SensorError, WaterTankEmpty, PidDisabled, EmergencyStop.
fn heater_path_faults(ctx: &MachineContext) -> Option<MachineState> {
    if sensor_error(ctx) {
        return Some(MachineState::SensorError);
    }
    if tank_empty(ctx) {
        return Some(MachineState::WaterTankEmpty);
    }
    if pid_off(ctx) {
        return Some(MachineState::PidDisabled);
    }
    if ctx.flags.emergency_stop {
        return Some(MachineState::EmergencyStop);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  INIT
// ═══════════════════════════════════════════════════════════════════════════

fn init_enter(ctx: &mut MachineContext) {
    ctx.commands = ActuatorCommands::all_off();
}

fn init_update(ctx: &mut MachineContext) -> Option<MachineState> {
    if sensor_error(ctx) {
        return Some(MachineState::SensorError);
    }
    if pid_off(ctx) {
        return Some(MachineState::PidDisabled);
    }
    if tank_empty(ctx) {
        return Some(MachineState::WaterTankEmpty);
    }
    Some(MachineState::PidNormal)
}

// ═══════════════════════════════════════════════════════════════════════════
//  PID NORMAL: heating, waiting for the user
// ═══════════════════════════════════════════════════════════════════════════

fn pid_normal_update(ctx: &mut MachineContext) -> Option<MachineState> {
    if let Some(next) = heater_path_faults(ctx) {
        return Some(next);
    }
    if ctx.standby_expired() {
        return Some(MachineState::Standby);
    }
    if ctx.flags.backflush_on {
        return Some(MachineState::Backflush);
    }
    if ctx.run_brew() {
        return Some(MachineState::Brew);
    }
    if ctx.run_flush() {
        return Some(MachineState::ManualFlush);
    }
    if ctx.run_hot_water() {
        return Some(MachineState::HotWater);
    }
    if ctx.flags.steam_on {
        return Some(MachineState::Steam);
    }
    None
}

/// Entry into any user activity restarts the standby countdown.
fn activity_enter(ctx: &mut MachineContext) {
    ctx.reset_standby();
}

// ═══════════════════════════════════════════════════════════════════════════
//  BREW / MANUAL FLUSH
// ═══════════════════════════════════════════════════════════════════════════

fn brew_update(ctx: &mut MachineContext) -> Option<MachineState> {
    if let Some(next) = brew_path_faults(ctx) {
        return Some(next);
    }
    if !ctx.run_brew() {
        return Some(MachineState::PidNormal);
    }
    None
}

fn brew_exit(ctx: &mut MachineContext) {
    ctx.brew.abort(&mut ctx.brew_switch, &mut ctx.commands);
}

fn manual_flush_update(ctx: &mut MachineContext) -> Option<MachineState> {
    if let Some(next) = brew_path_faults(ctx) {
        return Some(next);
    }
    if !ctx.run_flush() {
        return Some(MachineState::PidNormal);
    }
    None
}

fn manual_flush_exit(ctx: &mut MachineContext) {
    ctx.flush.abort(&mut ctx.commands);
}

// ═══════════════════════════════════════════════════════════════════════════
//  HOT WATER / STEAM
// ═══════════════════════════════════════════════════════════════════════════

fn hot_water_update(ctx: &mut MachineContext) -> Option<MachineState> {
    if let Some(next) = heater_path_faults(ctx) {
        return Some(next);
    }
    if !ctx.run_hot_water() {
        return Some(MachineState::PidNormal);
    }
    None
}

fn hot_water_exit(ctx: &mut MachineContext) {
    ctx.hot_water.abort(&mut ctx.commands);
}

fn steam_update(ctx: &mut MachineContext) -> Option<MachineState> {
    if let Some(next) = heater_path_faults(ctx) {
        ctx.hot_water.abort(&mut ctx.commands);
        return Some(next);
    }
    ctx.run_hot_water();
    if !ctx.flags.steam_on {
        // a draw started during steam carries on by itself
        if ctx.hot_water.is_running() {
            return Some(MachineState::HotWater);
        }
        return Some(MachineState::PidNormal);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  BACKFLUSH
// ═══════════════════════════════════════════════════════════════════════════

fn backflush_update(ctx: &mut MachineContext) -> Option<MachineState> {
    if let Some(next) = brew_path_faults(ctx) {
        return Some(next);
    }
    if tank_empty(ctx) && !ctx.backflush.state().is_active() {
        return Some(MachineState::WaterTankEmpty);
    }
    ctx.run_backflush();
    if !ctx.flags.backflush_on {
        return Some(MachineState::PidNormal);
    }
    None
}

fn backflush_exit(ctx: &mut MachineContext) {
    ctx.backflush.abort(&mut ctx.brew_switch, &mut ctx.commands);
}

// ═══════════════════════════════════════════════════════════════════════════
//  WATER TANK EMPTY / EMERGENCY STOP / PID DISABLED
// ═══════════════════════════════════════════════════════════════════════════

fn water_tank_empty_enter(_ctx: &mut MachineContext) {
    warn!("WATER TANK EMPTY: brew switch input ignored until refilled");
}

fn water_tank_empty_update(ctx: &mut MachineContext) -> Option<MachineState> {
    if sensor_error(ctx) {
        return Some(MachineState::SensorError);
    }
    if pid_off(ctx) {
        return Some(MachineState::PidDisabled);
    }
    if !tank_empty(ctx) {
        ctx.reset_standby();
        return Some(MachineState::PidNormal);
    }
    None
}

fn emergency_stop_enter(ctx: &mut MachineContext) {
    warn!(
        "EMERGENCY STOP: boiler at {:.1} °C, heater disabled",
        ctx.sensors.temperature_c
    );
}

fn emergency_stop_update(ctx: &mut MachineContext) -> Option<MachineState> {
    if sensor_error(ctx) {
        return Some(MachineState::SensorError);
    }
    if pid_off(ctx) {
        return Some(MachineState::PidDisabled);
    }
    if !ctx.flags.emergency_stop {
        return Some(MachineState::PidNormal);
    }
    None
}

fn pid_disabled_update(ctx: &mut MachineContext) -> Option<MachineState> {
    if sensor_error(ctx) {
        return Some(MachineState::SensorError);
    }
    if ctx.flags.pid_on {
        return Some(MachineState::PidNormal);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  STANDBY: heater off until the user comes back
// ═══════════════════════════════════════════════════════════════════════════

fn standby_enter(ctx: &mut MachineContext) {
    ctx.flags.pid_on = false;
    info!("STANDBY: heater off");
}

fn standby_exit(ctx: &mut MachineContext) {
    ctx.flags.pid_on = true;
    ctx.reset_standby();
}

fn standby_update(ctx: &mut MachineContext) -> Option<MachineState> {
    if sensor_error(ctx) {
        return Some(MachineState::SensorError);
    }
    if ctx.flags.backflush_on {
        return Some(MachineState::Backflush);
    }
    if ctx.run_brew() {
        return Some(MachineState::Brew);
    }
    if ctx.run_flush() {
        return Some(MachineState::ManualFlush);
    }
    if ctx.flags.steam_on {
        return Some(MachineState::Steam);
    }
    if ctx.flags.pid_on {
        return Some(MachineState::PidNormal);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SENSOR / EEPROM ERROR: terminal, everything off
// ═══════════════════════════════════════════════════════════════════════════

fn fault_enter(ctx: &mut MachineContext) {
    ctx.commands = ActuatorCommands::all_off();
    error!("FAULT: all actuators disabled, restart required");
}

fn terminal_update(_ctx: &mut MachineContext) -> Option<MachineState> {
    None
}
