//! Unified error types for the TankWatch firmware.
//!
//! Every variant is `Copy` so errors can be stored as "last error" fields
//! and passed through the control cycle without allocation.  Sensor errors
//! and pump rejections are ordinary values, never panics: the control loop
//! logs them, surfaces them to collaborators, and carries on.

use core::fmt;

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Why an acquisition (or a single ranging measurement) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SensorError {
    /// No echo observed within the timeout, or no valid sample at all.
    Timeout,
    /// Too few plausible samples to trust a median.
    OutOfRange,
    /// A trigger/echo pin operation failed.
    Hardware,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "echo timeout"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::Hardware => write!(f, "sensor hardware fault"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pump faults / rejection reasons
// ---------------------------------------------------------------------------

/// Reasons a pump request was rejected or the pump was emergency-stopped.
///
/// The `Display` strings are part of the external contract: telemetry and
/// command channels forward them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PumpFault {
    /// `turn_on` while the pump is already on.
    AlreadyRunning,
    /// `turn_on` before the cooldown period elapsed.
    InCooldown,
    /// `turn_on` while latched in `Error`.
    LatchedError,
    /// Source tank below the dry-run threshold.
    SourceTooLow,
    /// Automatic-mode run exceeded `max_run_time`.
    MaxRunTimeExceeded,
    /// Manual-mode run exceeded `max_run_time`.
    SafetyLimitReached,
    /// `turn_off` while the pump is not on.  Never latched as `last_error`.
    NotRunning,
}

impl PumpFault {
    /// The reason string exposed to collaborators.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyRunning => "Already running",
            Self::InCooldown => "In cooldown",
            Self::LatchedError => "Error state - manual reset required",
            Self::SourceTooLow => "Source tank too low (dry-run protection)",
            Self::MaxRunTimeExceeded => "Maximum run time exceeded",
            Self::SafetyLimitReached => "Safety limit reached",
            Self::NotRunning => "Not running",
        }
    }
}

impl fmt::Display for PumpFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration validation and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Application-level error
// ---------------------------------------------------------------------------

/// Outcome of a rejected [`AppCommand`](crate::app::commands::AppCommand).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    /// The pump refused the request.
    Pump(PumpFault),
    /// The supplied configuration was invalid.
    Config(ConfigError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pump(e) => write!(f, "pump: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl From<PumpFault> for AppError {
    fn from(e: PumpFault) -> Self {
        Self::Pump(e)
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl std::error::Error for SensorError {}
impl std::error::Error for PumpFault {}
impl std::error::Error for ConfigError {}
impl std::error::Error for AppError {}
