//! brewctl firmware: main entry point.
//!
//! Hexagonal architecture driven by a cooperative, budgeted loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter      LogEventSink      NvsAdapter             │
//! │  (Sensor+Actuator)    (EventSink)       (StoragePort)          │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            MachineService (pure logic)                 │    │
//! │  │  FSM · brew/flush/backflush/hot water · pump · heater  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  CooperativeScheduler (control · persist)                      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use esp_idf_hal::delay::FreeRtos;
use log::{error, info, warn};

use brewctl::adapters::hardware::{HardwareAdapter, SwitchBank};
use brewctl::adapters::log_sink::LogEventSink;
use brewctl::adapters::nvs::NvsAdapter;
use brewctl::app::ports::{StoragePort, TaskDelegate};
use brewctl::app::service::MachineService;
use brewctl::config::{ParameterStore, Settings, SwitchConfig};
use brewctl::drivers::dimmer::{DIMMER, PumpDimmer};
use brewctl::drivers::gpio::NativePin;
use brewctl::drivers::heater::HEATER;
use brewctl::drivers::hw_init;
use brewctl::drivers::hw_timer;
use brewctl::drivers::pump_control::PumpControl;
use brewctl::drivers::relay::{Relay, TriggerType};
use brewctl::drivers::switch::Switch;
use brewctl::pins;
use brewctl::profiles::ProfileCatalog;
use brewctl::scheduler::{CooperativeScheduler, Task};
use brewctl::sensors::SensorHub;

/// Idle time between scheduler passes.
const LOOP_PERIOD_MS: u32 = 10;
/// Non-critical work per pass.
const LOOP_BUDGET_US: u32 = 5_000;

const TASK_CONTROL: &str = "control";
const TASK_PERSIST: &str = "persist";

type Hardware = HardwareAdapter<NativePin, NativePin>;

// ── Task delegate ─────────────────────────────────────────────
//
// Bridges the scheduler (which only knows task labels) to the service
// and adapters.

struct Firmware {
    service: MachineService,
    hw: Hardware,
    params: ParameterStore,
    saved: ParameterStore,
    nvs: NvsAdapter,
    sink: LogEventSink,
}

impl TaskDelegate for Firmware {
    fn run(&mut self, label: &'static str) -> u32 {
        let start = hw_init::now_us();
        match label {
            TASK_CONTROL => {
                let now_ms = hw_init::now_ms();
                self.service.tick(now_ms, &mut self.hw, &self.params, &mut self.sink);
            }
            TASK_PERSIST => {
                if self.params != self.saved {
                    match self.nvs.save(&self.params) {
                        Ok(()) => self.saved = self.params.clone(),
                        Err(e) => {
                            error!("parameter save failed: {}", e);
                            self.service.report_storage_fault(&mut self.hw, &mut self.sink);
                        }
                    }
                }
            }
            other => warn!("scheduler: no task body for '{}'", other),
        }
        hw_init::now_us().saturating_sub(start) as u32
    }
}

fn switch(cfg: SwitchConfig, gpio: u8) -> Option<Switch<NativePin>> {
    cfg.enabled
        .then(|| Switch::new(NativePin::new(gpio), cfg.kind, cfg.mode))
}

fn build_hardware(settings: &Settings) -> Hardware {
    let switches = SwitchBank {
        brew: switch(settings.switches.brew, pins::BREW_SWITCH_GPIO),
        hot_water: switch(settings.switches.hot_water, pins::HOT_WATER_SWITCH_GPIO),
        steam: switch(settings.switches.steam, pins::STEAM_SWITCH_GPIO),
    };

    let pump_pin = NativePin::new(pins::PUMP_GPIO);
    let pump = if settings.pump.enabled {
        info!("pump: zero-cross dimmer ({:?})", settings.pump.method);
        let mut dimmer = PumpDimmer::new(pump_pin, &DIMMER);
        dimmer.set_control_method(settings.pump.method);
        PumpControl::Dimmer(dimmer)
    } else {
        info!("pump: relay");
        PumpControl::Relay(Relay::new(pump_pin, TriggerType::High))
    };

    HardwareAdapter::new(
        SensorHub::default(),
        switches,
        Relay::new(NativePin::new(pins::VALVE_RELAY_GPIO), TriggerType::High),
        pump,
        &HEATER,
    )
}

/// Boot failed after the timers were started.  Stops them and drops the
/// heater relay.
fn abort_boot(err: anyhow::Error) -> anyhow::Error {
    error!("boot aborted: {:#}", err);
    hw_timer::stop_timers();
    err
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  brewctl v{:<27}║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    hw_init::init_peripherals().map_err(|e| anyhow!("peripheral init failed: {e}"))?;
    hw_timer::start_timers().map_err(|e| anyhow!("timer start failed: {e}"))?;
    if let Err(e) = hw_init::init_isr_service() {
        error!("ISR service init failed: {}; pump dimmer unavailable", e);
    }

    // ── 3. Parameters ─────────────────────────────────────────
    let mut storage_fault = false;
    let mut nvs = match NvsAdapter::new() {
        Ok(nvs) => nvs,
        Err(e) => return Err(abort_boot(anyhow!("NVS init failed: {e}"))),
    };
    let params = match nvs.load() {
        Ok(p) => p,
        Err(e) => {
            error!("parameter load failed: {}", e);
            storage_fault = true;
            ParameterStore::defaults()
        }
    };
    if !storage_fault {
        if let Err(e) = nvs.save(&params) {
            error!("parameter save failed: {}", e);
            storage_fault = true;
        }
    }

    // ── 4. Adapters and service ───────────────────────────────
    let catalog = match ProfileCatalog::builtin() {
        Ok(catalog) => catalog,
        Err(e) => return Err(abort_boot(anyhow!("profile catalog: {e}"))),
    };
    let settings = Settings::load(&params);
    let hw = build_hardware(&settings);

    let mut fw = Firmware {
        service: MachineService::new(catalog, &params),
        hw,
        saved: params.clone(),
        params,
        nvs,
        sink: LogEventSink::new(),
    };
    fw.service.start(&mut fw.sink);
    if storage_fault {
        fw.service.report_storage_fault(&mut fw.hw, &mut fw.sink);
    }

    let mut sched = CooperativeScheduler::new();
    let tasks = [
        Task {
            label: TASK_CONTROL,
            period_ms: 50,
            critical: true,
        },
        Task {
            label: TASK_PERSIST,
            period_ms: 5_000,
            critical: false,
        },
    ];
    for task in tasks {
        if sched.add(task).is_none() {
            warn!("scheduler full, '{}' not registered", task.label);
        }
    }

    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        sched.tick(hw_init::now_ms(), LOOP_BUDGET_US, &mut fw);
        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
