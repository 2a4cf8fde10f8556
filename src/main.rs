//! TankWatch Firmware — Main Entry Point
//!
//! Hexagonal architecture with a single periodic control cycle.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  PulseTimer ×2     PumpRelay      LogEventSink   NvsAdapter    │
//! │  (RangeFinder)     (Actuator)     (EventSink)    (ConfigPort)  │
//! │  Esp32TimeAdapter (ClockPort)     Watchdog (TWDT)              │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Acquisition pipelines · Pump FSM                      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin, Input, Output, PinDriver};
use log::{info, warn};

use tankwatch::adapters::log_sink::LogEventSink;
use tankwatch::adapters::nvs::NvsAdapter;
use tankwatch::adapters::time::Esp32TimeAdapter;
use tankwatch::app::service::{load_or_default, AppService};
use tankwatch::config::{SystemConfig, TankConfig};
use tankwatch::drivers::relay::{PumpRelay, RelayPolarity};
use tankwatch::drivers::watchdog::{timeout_for_interval, Watchdog};
use tankwatch::sensors::pulse_timer::PulseTimer;

type OutPin = PinDriver<'static, AnyOutputPin, Output>;
type InPin = PinDriver<'static, AnyInputPin, Input>;
type Ranger = PulseTimer<OutPin, InPin, Ets, Esp32TimeAdapter>;

/// Claim the trigger/echo pair configured for one tank.
fn build_ranger(tank: &TankConfig, clock: Esp32TimeAdapter) -> Result<Ranger> {
    // SAFETY: pin numbers come from the stored config; nothing else in the
    // firmware claims them.
    let trig = PinDriver::output(unsafe { AnyOutputPin::new(tank.trig_gpio) })?;
    let echo = PinDriver::input(unsafe { AnyInputPin::new(tank.echo_gpio) })?;
    Ok(PulseTimer::new(trig, echo, Ets, clock))
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  TankWatch v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = nvs
        .as_ref()
        .map_or_else(SystemConfig::default, load_or_default);
    info!(
        "Config: {:?} tank mode, pump {:?}, cycle {}ms",
        config.tank_mode, config.pump.mode, config.sensor.read_interval_ms
    );

    // ── 3. Construct adapters ─────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let tank1 = build_ranger(&config.tank1, clock)?;
    let tank2 = if config.is_dual() {
        Some(build_ranger(&config.tank2, clock)?)
    } else {
        None
    };

    // SAFETY: the relay GPIO is distinct from every ranging pin.
    let relay_pin = PinDriver::output(unsafe { AnyOutputPin::new(config.pump.relay_gpio) })?;
    let relay = PumpRelay::new(relay_pin, RelayPolarity::ActiveHigh);

    let mut log_sink = LogEventSink::new();
    let mut watchdog = Watchdog::new(timeout_for_interval(config.sensor.read_interval_ms));

    // ── 4. Construct app service ──────────────────────────────
    let mut app = AppService::new(config, tank1, tank2, relay, clock);
    app.start(&mut log_sink);

    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        app.tick(&mut log_sink);

        // Config auto-save (5s debounce after last change).
        if let Some(nvs) = nvs.as_ref() {
            app.auto_save_if_needed(nvs);
        }

        // A runtime config may have changed the cycle period.
        let interval = app.config().sensor.read_interval_ms;
        watchdog.follow_interval(interval);
        watchdog.feed();
        FreeRtos::delay_ms(interval);
    }
}
