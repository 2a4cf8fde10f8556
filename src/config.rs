//! System configuration parameters
//!
//! All tunable parameters for the TankWatch system.  Values are loaded from
//! NVS at boot and may be replaced at runtime through
//! [`AppCommand::UpdateConfig`](crate::app::commands::AppCommand).
//!
//! Validation always rejects, never clamps: a compromised command channel
//! must not be able to slip in a calibration or threshold set that disables
//! the pump interlocks.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Absolute lower bound of the ranging hardware (cm).
pub const SENSOR_MIN_CM: f32 = 5.0;
/// Absolute upper bound of the ranging hardware (cm).
pub const SENSOR_MAX_CM: f32 = 500.0;

/// Valid range for the number of samples per acquisition.
pub const SAMPLE_COUNT_MIN: u8 = 3;
pub const SAMPLE_COUNT_MAX: u8 = 10;

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Reference distances used to map a raw distance to a fill percentage.
///
/// `empty_cm` is sensor-to-bottom, `full_cm` is sensor-to-full-surface, so a
/// valid pair always has `empty_cm > full_cm`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPair {
    pub empty_cm: f32,
    pub full_cm: f32,
}

impl CalibrationPair {
    /// Build a validated calibration pair.
    pub fn new(empty_cm: f32, full_cm: f32) -> Result<Self, ConfigError> {
        let pair = Self { empty_cm, full_cm };
        pair.validate()?;
        Ok(pair)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.empty_cm.is_finite() || !self.full_cm.is_finite() {
            return Err(ConfigError::ValidationFailed(
                "calibration distances must be finite",
            ));
        }
        if self.empty_cm <= self.full_cm {
            return Err(ConfigError::ValidationFailed(
                "empty_cm must be greater than full_cm",
            ));
        }
        if self.empty_cm > SENSOR_MAX_CM {
            return Err(ConfigError::ValidationFailed("empty_cm must be <= 500"));
        }
        if self.full_cm < SENSOR_MIN_CM {
            return Err(ConfigError::ValidationFailed("full_cm must be >= 5"));
        }
        Ok(())
    }

    /// Distance span between the empty and full references.
    pub fn span_cm(&self) -> f32 {
        self.empty_cm - self.full_cm
    }
}

impl Default for CalibrationPair {
    fn default() -> Self {
        Self {
            empty_cm: 200.0,
            full_cm: 10.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Pump safety thresholds
// ---------------------------------------------------------------------------

/// Time and level limits enforced by the pump state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyThresholds {
    /// Hard floor on run time before the automatic path may stop the pump.
    pub min_run_time_ms: u32,
    /// Run time after which the pump is emergency-stopped.
    pub max_run_time_ms: u32,
    /// Mandatory idle period after a normal stop.
    pub cooldown_time_ms: u32,
    /// Level (%) at or below which automatic mode starts the pump.
    pub auto_on_threshold: f32,
    /// Level (%) at or above which automatic mode stops the pump.
    pub auto_off_threshold: f32,
    /// Source level (%) below which the pump must not run.
    pub dry_run_threshold: f32,
}

impl SafetyThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pct = 0.0..=100.0;
        if !pct.contains(&self.auto_on_threshold) || !pct.contains(&self.auto_off_threshold) {
            return Err(ConfigError::ValidationFailed(
                "auto thresholds must be 0–100",
            ));
        }
        if self.auto_on_threshold >= self.auto_off_threshold {
            return Err(ConfigError::ValidationFailed(
                "auto_on_threshold must be < auto_off_threshold",
            ));
        }
        if !pct.contains(&self.dry_run_threshold) {
            return Err(ConfigError::ValidationFailed(
                "dry_run_threshold must be 0–100",
            ));
        }
        if self.max_run_time_ms == 0 {
            return Err(ConfigError::ValidationFailed("max_run_time_ms must be > 0"));
        }
        if self.min_run_time_ms > self.max_run_time_ms {
            return Err(ConfigError::ValidationFailed(
                "min_run_time_ms must be <= max_run_time_ms",
            ));
        }
        Ok(())
    }
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            min_run_time_ms: 10_000,    // 10 s
            max_run_time_ms: 3_600_000, // 60 min
            cooldown_time_ms: 60_000,   // 1 min
            auto_on_threshold: 20.0,
            auto_off_threshold: 90.0,
            dry_run_threshold: 5.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tanks, sensors, pump
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TankMode {
    /// Only tank 1 is measured; the source is assumed full.
    Single,
    /// Tank 2 is measured and acts as the pump's source tank.
    Dual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpMode {
    Manual,
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TankConfig {
    pub calibration: CalibrationPair,
    pub trig_gpio: i32,
    pub echo_gpio: i32,
}

/// Acquisition tuning shared by every tank sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorTuning {
    /// Raw measurements per acquisition (3–10).
    pub sample_count: u8,
    /// Echo timeout per measurement (µs).
    pub timeout_us: u32,
    /// Pause between measurements to avoid acoustic cross-talk (ms).
    pub inter_sample_delay_ms: u32,
    /// Period of the acquisition + pump cycle (ms).
    pub read_interval_ms: u32,
}

impl Default for SensorTuning {
    fn default() -> Self {
        Self {
            sample_count: 5,
            timeout_us: 30_000,
            inter_sample_delay_ms: 10,
            read_interval_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PumpConfig {
    pub mode: PumpMode,
    pub relay_gpio: i32,
    pub thresholds: SafetyThresholds,
    /// Apply dry-run protection to a manually started pump as well.
    pub manual_dry_run_protection: bool,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            mode: PumpMode::Manual,
            relay_gpio: 27,
            thresholds: SafetyThresholds::default(),
            manual_dry_run_protection: true,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub tank_mode: TankMode,
    pub tank1: TankConfig,
    pub tank2: TankConfig,
    pub sensor: SensorTuning,
    pub pump: PumpConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            tank_mode: TankMode::Single,
            tank1: TankConfig {
                calibration: CalibrationPair::default(),
                trig_gpio: 25,
                echo_gpio: 26,
            },
            tank2: TankConfig {
                calibration: CalibrationPair::default(),
                trig_gpio: 32,
                echo_gpio: 33,
            },
            sensor: SensorTuning::default(),
            pump: PumpConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Range-check every field.  Called before persisting and before a
    /// runtime replacement is applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tank1.calibration.validate()?;
        if self.tank_mode == TankMode::Dual {
            self.tank2.calibration.validate()?;
        }
        if !(SAMPLE_COUNT_MIN..=SAMPLE_COUNT_MAX).contains(&self.sensor.sample_count) {
            return Err(ConfigError::ValidationFailed("sample_count must be 3–10"));
        }
        if self.sensor.timeout_us == 0 {
            return Err(ConfigError::ValidationFailed("timeout_us must be > 0"));
        }
        if self.sensor.read_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("read_interval_ms must be > 0"));
        }
        self.pump.thresholds.validate()
    }

    /// Whether the source tank (tank 2) is measured.
    pub fn is_dual(&self) -> bool {
        self.tank_mode == TankMode::Dual
    }
}
