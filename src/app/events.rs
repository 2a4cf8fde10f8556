//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, publish over MQTT,
//! push to a display.

use serde::Serialize;

use crate::config::PumpMode;
use crate::error::{PumpFault, SensorError};
use crate::fsm::PumpState;
use crate::sensors::{SensorReading, TankId};

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Per-cycle telemetry snapshot.
    Telemetry(TelemetryData),

    /// The pump state machine moved.
    StateChanged { from: PumpState, to: PumpState },

    /// The pump was emergency-stopped and is latched in `Error`.
    EmergencyStop(PumpFault),

    /// A pump command was refused.
    CommandRejected(PumpFault),

    /// A tank sensor crossed the degraded/healthy boundary.
    SensorHealth { tank: TankId, healthy: bool },

    /// A new configuration was applied at runtime.
    ConfigApplied,

    /// The service has started (carries initial pump state).
    Started(PumpState),
}

/// One tank's part of a telemetry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TankTelemetry {
    pub tank: TankId,
    pub valid: bool,
    pub level_percent: f32,
    pub distance_cm: f32,
    pub error: Option<SensorError>,
    pub healthy: bool,
    /// Level of the last valid reading, if any.
    pub last_good_percent: Option<f32>,
}

impl TankTelemetry {
    pub fn new(
        tank: TankId,
        latest: &SensorReading,
        last_good: Option<&SensorReading>,
        healthy: bool,
    ) -> Self {
        Self {
            tank,
            valid: latest.is_valid,
            level_percent: latest.level_percent,
            distance_cm: latest.distance_cm,
            error: latest.error,
            healthy,
            last_good_percent: last_good.map(|r| r.level_percent),
        }
    }
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryData {
    pub uptime_ms: u64,
    pub tank1: TankTelemetry,
    /// Present in dual-tank mode only.
    pub tank2: Option<TankTelemetry>,
    pub pump_state: PumpState,
    pub pump_mode: PumpMode,
    pub run_time_ms: u64,
    pub cooldown_remaining_ms: u64,
    /// Reason string of the last rejection or emergency stop.
    pub last_error: Option<&'static str>,
}

impl TelemetryData {
    /// JSON payload for network collaborators.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
