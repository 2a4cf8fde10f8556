//! Distance acquisition and filtering.
//!
//! One [`DistanceAcquisitionPipeline`](pipeline::DistanceAcquisitionPipeline)
//! per tank turns raw echo timings into a calibrated fill level:
//!
//! ```text
//!  PulseTimer ──▶ SampleValidator ──▶ MedianAggregator ──▶ LevelMapper
//!  (echo µs)      (5–500 cm gate)     (quorum ≥ 3)         (0–100 %)
//! ```
//!
//! The result of every cycle is a [`SensorReading`], valid or not.

pub mod level;
pub mod median;
pub mod pipeline;
pub mod pulse_timer;
pub mod validator;

use serde::Serialize;

use crate::error::SensorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TankId {
    /// The tank the pump fills.
    Tank1,
    /// The source tank (dual-tank mode only).
    Tank2,
}

/// Outcome of one acquisition cycle.  Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    /// Median distance (cm); 0 when invalid.
    pub distance_cm: f32,
    /// Fill level (0–100 %); 0 when invalid.
    pub level_percent: f32,
    pub is_valid: bool,
    /// Milliseconds since boot when the acquisition finished.
    pub timestamp_ms: u64,
    /// `None` on success.
    pub error: Option<SensorError>,
}

impl SensorReading {
    /// Placeholder before the first successful acquisition.
    pub const fn empty() -> Self {
        Self {
            distance_cm: 0.0,
            level_percent: 0.0,
            is_valid: false,
            timestamp_ms: 0,
            error: None,
        }
    }

    pub(crate) fn valid(distance_cm: f32, level_percent: f32, timestamp_ms: u64) -> Self {
        Self {
            distance_cm,
            level_percent,
            is_valid: true,
            timestamp_ms,
            error: None,
        }
    }

    pub(crate) fn failed(error: SensorError, timestamp_ms: u64) -> Self {
        Self {
            distance_cm: 0.0,
            level_percent: 0.0,
            is_valid: false,
            timestamp_ms,
            error: Some(error),
        }
    }

    /// The level, if this reading may be acted upon.
    pub fn level(&self) -> Option<f32> {
        self.is_valid.then_some(self.level_percent)
    }
}

impl Default for SensorReading {
    fn default() -> Self {
        Self::empty()
    }
}
