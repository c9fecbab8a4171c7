//! Closed-loop control: pump PID, brew profile interpreter, boiler heater.

pub mod pid;
pub mod profile;
pub mod pump;
pub mod temperature;
