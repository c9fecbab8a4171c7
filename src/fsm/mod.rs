//! Function-pointer finite state machine for the machine-state supervisor.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌──────────────┬───────────┬──────────┬───────────────────┐ │
//! │  │ MachineState │ on_enter  │ on_exit  │ on_update         │ │
//! │  ├──────────────┼───────────┼──────────┼───────────────────┤ │
//! │  │ Init         │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ PidNormal    │ -         │ -        │ fn(ctx)->Option<> │ │
//! │  │ Brew         │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  │ ...          │           │          │                   │ │
//! │  └──────────────┴───────────┴──────────┴───────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  All functions receive `&mut MachineContext`, which
//! holds the sensor snapshot, the sub-machines and the actuator commands.

pub mod context;
pub mod states;

use core::fmt;

use context::MachineContext;
use log::{debug, info};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Top-level machine states.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MachineState {
    Init = 0,
    PidNormal = 1,
    Brew = 2,
    ManualFlush = 3,
    HotWater = 4,
    Steam = 5,
    Backflush = 6,
    WaterTankEmpty = 7,
    EmergencyStop = 8,
    PidDisabled = 9,
    Standby = 10,
    SensorError = 11,
    EepromError = 12,
}

impl MachineState {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 13;

    /// Convert an index back to `MachineState`.  Out-of-range indices
    /// assert in debug builds and map to `SensorError` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Init,
            1 => Self::PidNormal,
            2 => Self::Brew,
            3 => Self::ManualFlush,
            4 => Self::HotWater,
            5 => Self::Steam,
            6 => Self::Backflush,
            7 => Self::WaterTankEmpty,
            8 => Self::EmergencyStop,
            9 => Self::PidDisabled,
            10 => Self::Standby,
            11 => Self::SensorError,
            12 => Self::EepromError,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::SensorError
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::PidNormal => "PID Normal",
            Self::Brew => "Brew",
            Self::ManualFlush => "Manual Flush",
            Self::HotWater => "Hot Water",
            Self::Steam => "Steam",
            Self::Backflush => "Backflush",
            Self::WaterTankEmpty => "Water Tank Empty",
            Self::EmergencyStop => "Emergency Stop",
            Self::PidDisabled => "PID Disabled",
            Self::Standby => "Standby Mode",
            Self::SensorError => "Sensor Error",
            Self::EepromError => "EEPROM Error",
        }
    }

    /// States in which the brew valve may be open.
    pub fn allows_valve(self) -> bool {
        matches!(self, Self::Brew | Self::ManualFlush | Self::Backflush)
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut MachineContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut MachineContext) -> Option<MachineState>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single supervisor state.
pub struct StateDescriptor {
    pub id: MachineState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `MachineState as usize`.
    table: [StateDescriptor; MachineState::COUNT],
    current: usize,
    tick_count: u64,
    state_entry_tick: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; MachineState::COUNT], initial: MachineState) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut MachineContext) {
        info!("machine state: starting in {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the supervisor by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    pub fn tick(&mut self, ctx: &mut MachineContext) {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;
        ctx.total_ticks = self.tick_count;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            if next_id as usize != self.current {
                self.transition(next_id, ctx);
            }
        }
    }

    /// Force an immediate transition regardless of what `on_update` says
    /// (storage faults reported by the parameter layer).
    pub fn force_transition(&mut self, next: MachineState, ctx: &mut MachineContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> MachineState {
        MachineState::from_index(self.current)
    }

    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: MachineState, ctx: &mut MachineContext) {
        let next_idx = next_id as usize;

        info!(
            "machine state: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

/// Mask actuator requests the current machine state does not allow.
///
/// The valve may only be open in brew, manual flush and backflush; the pump
/// additionally runs for hot water, including a draw during steam.
pub fn safety_pass(state: MachineState, ctx: &mut MachineContext) {
    let pump_allowed = state.allows_valve()
        || state == MachineState::HotWater
        || (state == MachineState::Steam && ctx.hot_water.is_running());

    if ctx.commands.valve && !state.allows_valve() {
        debug!("safety: valve closed in {}", state);
        ctx.commands.valve = false;
    }
    if ctx.commands.pump && !pump_allowed {
        debug!("safety: pump stopped in {}", state);
        ctx.commands.pump = false;
    }
}
