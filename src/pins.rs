//! GPIO / peripheral pin assignments for the controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Numbers at or above [`EXPANDER_BASE_PIN`]
//! address the PCF8575 I²C port expander instead of a native pin.

// ---------------------------------------------------------------------------
// Port expander
// ---------------------------------------------------------------------------

/// First virtual pin number routed to the PCF8575 (expander pin 0).
pub const EXPANDER_BASE_PIN: u8 = 40;
/// Number of quasi-bidirectional pins on the PCF8575.
pub const EXPANDER_PIN_COUNT: u8 = 16;
/// 7-bit I²C address with A0..A2 strapped low.
pub const EXPANDER_I2C_ADDR: u8 = 0x20;
pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;

// ---------------------------------------------------------------------------
// Relays and the pump dimmer
// ---------------------------------------------------------------------------

/// Solid-state relay for the boiler heater (driven from the 10 ms timer).
pub const HEATER_RELAY_GPIO: u8 = 14;
/// Three-way solenoid valve relay.
pub const VALVE_RELAY_GPIO: u8 = 17;
/// Pump triac gate (dimmer) or pump relay when no dimmer is fitted.
pub const PUMP_GPIO: u8 = 27;
/// Zero-cross detector output from the dimmer module (rising edge).
pub const ZERO_CROSS_GPIO: u8 = 18;

// ---------------------------------------------------------------------------
// Switches
// ---------------------------------------------------------------------------

pub const BREW_SWITCH_GPIO: u8 = 34;
pub const HOT_WATER_SWITCH_GPIO: u8 = 4;
pub const STEAM_SWITCH_GPIO: u8 = 35;
pub const POWER_SWITCH_GPIO: u8 = 39;

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Pressure transducer (0.5–4.5 V, 0–16 bar), ADC1 channel 6.
pub const PRESSURE_ADC_CHANNEL: u32 = 6;
/// Boiler temperature sensor (PT1000 front end), ADC1 channel 7.
pub const TEMPERATURE_ADC_CHANNEL: u32 = 7;
/// Optical water-tank level sensor; HIGH = water present.
pub const WATER_TANK_GPIO: u8 = 23;
