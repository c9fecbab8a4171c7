//! Cooperative sub-machines driven by the supervisor.
//!
//! Each one is polled once per control tick, writes its valve and pump
//! requests into [`ActuatorCommands`](crate::fsm::context::ActuatorCommands)
//! and never blocks: every wait is a re-check on the next tick.

pub mod backflush;
pub mod brew;
pub mod brew_switch;
pub mod hot_water;
pub mod manual_flush;
