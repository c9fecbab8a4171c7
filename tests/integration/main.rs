//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that runs the full [`MachineService`]
//! tick against the mock adapters in [`mock_hw`].  All tests run on the
//! host (x86_64) with no real hardware required.
//!
//! [`MachineService`]: brewctl::app::service::MachineService

#![cfg(not(target_os = "espidf"))]

mod backflush_tests;
mod brew_scenarios;
mod mock_hw;
mod supervisor_tests;
