//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements    | Connects to                       |
//! |-------------|---------------|-----------------------------------|
//! | `hardware`  | SensorPort    | ADC sensors, switches, scale cell  |
//! |             | ActuatorPort  | valve relay, pump, heater window  |
//! | `log_sink`  | EventSink     | Serial log output                 |
//! | `nvs`       | StoragePort   | NVS / in-memory blob store        |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
