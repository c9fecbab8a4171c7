//! Application core: pure domain logic, zero I/O.
//!
//! Supervisor orchestration, the brew/flush/backflush/hot-water
//! sub-machines, pump and heater loops.  All interaction with hardware
//! happens through **port traits** defined in [`ports`], keeping this
//! layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
