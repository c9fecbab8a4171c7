//! Actuator and input drivers, hardware initialisation, and timers.

pub mod dimmer;
pub mod gpio;
pub mod heater;
pub mod hw_init;
pub mod hw_timer;
pub mod pcf8575;
pub mod pump_control;
pub mod relay;
pub mod switch;
