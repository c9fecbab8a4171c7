//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).  A display or MQTT
//! adapter would implement the same trait.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | state={} | brew={:?} {}ms | T={:.1}\u{00b0}C heater={}ms | \
                     p={:.1}bar flow={:.1}mL/s w={:.1}g | pump={}% {:?} phase={} | \
                     estop={} standby_in={}s",
                    t.state,
                    t.brew,
                    t.brew_ms,
                    t.temperature_c,
                    t.heater_output_ms,
                    t.pressure_bar,
                    t.flow_ml_s,
                    t.weight_g,
                    t.pump_power,
                    t.pump_mode,
                    t.profile_phase,
                    t.emergency_stop,
                    t.standby_remaining_ms / 1000,
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            AppEvent::ShotFinished(shot) => match shot.weight_g {
                Some(w) => info!("SHOT  | {:.1}s {:.1}g", shot.duration_ms as f32 / 1000.0, w),
                None => info!("SHOT  | {:.1}s", shot.duration_ms as f32 / 1000.0),
            },
            AppEvent::BackflushFinished { cycles } => {
                info!("CLEAN | backflush done, {} cycles", cycles);
            }
            AppEvent::PhaseChanged { index } => {
                info!("PHASE | {}", index);
            }
            AppEvent::ProfileCompleted => {
                info!("PHASE | profile complete");
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state);
            }
        }
    }
}
