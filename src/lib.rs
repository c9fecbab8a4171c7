//! brewctl: espresso machine control core.
//!
//! Exposes the pure-logic modules for integration testing and the
//! firmware binary.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod fsm;
pub mod modes;
pub mod profiles;
pub mod scheduler;
pub mod standby;

pub mod error;
pub mod pins;

// The ESP-IDF glue compiles on the host too; the real implementations are
// guarded by cfg attributes inside.
pub mod adapters;
pub mod drivers;
pub mod sensors;
