//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A future MQTT adapter would implement the same trait and publish
//! [`TelemetryData::to_json`](crate::app::events::TelemetryData::to_json).

use log::{info, warn};

use crate::app::events::{AppEvent, TankTelemetry};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn tank_field(t: &TankTelemetry) -> String {
    match t.error {
        None => format!("{:.1}% ({:.1}cm)", t.level_percent, t.distance_cm),
        Some(e) => match t.last_good_percent {
            Some(p) => format!("ERR:{} (last {:.1}%)", e, p),
            None => format!("ERR:{}", e),
        },
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                let tank2 = t
                    .tank2
                    .as_ref()
                    .map(tank_field)
                    .unwrap_or_else(|| "-".into());
                info!(
                    "TELEM | t={}s | tank1={} tank2={} | pump={} {:?} run={}s cd={}s | err={}",
                    t.uptime_ms / 1000,
                    tank_field(&t.tank1),
                    tank2,
                    t.pump_state,
                    t.pump_mode,
                    t.run_time_ms / 1000,
                    t.cooldown_remaining_ms / 1000,
                    t.last_error.unwrap_or("none"),
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("PUMP | {} -> {}", from, to);
            }
            AppEvent::EmergencyStop(fault) => {
                warn!("ESTOP | {}", fault);
            }
            AppEvent::CommandRejected(fault) => {
                warn!("REJECT | {}", fault);
            }
            AppEvent::SensorHealth { tank, healthy } => {
                if *healthy {
                    info!("SENSOR | {:?} recovered", tank);
                } else {
                    warn!("SENSOR | {:?} degraded", tank);
                }
            }
            AppEvent::ConfigApplied => {
                info!("CONFIG | applied");
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state);
            }
        }
    }
}
