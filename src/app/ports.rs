//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (clock, relay, event sinks, config storage) implement
//! these traits.  The sensor pipeline, pump controller, and
//! [`AppService`](super::service::AppService) consume them via generics, so
//! the domain core never touches hardware directly.  Ranging hardware is
//! reached through [`RangeFinder`](crate::sensors::pulse_timer::RangeFinder)
//! and the `embedded-hal` pin traits instead.

use crate::config::SystemConfig;
use crate::error::ConfigError;

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: monotonic time → domain)
// ───────────────────────────────────────────────────────────────

/// Monotonic time source.
///
/// Microsecond resolution is needed for echo timing; the pump state machine
/// works in milliseconds.
pub trait ClockPort {
    /// Microseconds since boot (monotonic).
    fn now_us(&self) -> u64;

    /// Milliseconds since boot (monotonic).
    fn now_ms(&self) -> u64 {
        self.now_us() / 1000
    }
}

impl<T: ClockPort + ?Sized> ClockPort for &T {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → relay)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the pump relay.
///
/// Only [`PumpController`](crate::control::pump::PumpController) calls this,
/// once per state transition that changes relay intent.
pub trait ActuatorPort {
    /// Energise (`true`) or release (`false`) the pump relay.
    fn set_actuator(&mut self, energized: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT,
/// BLE characteristic, display, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// # Security
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}
