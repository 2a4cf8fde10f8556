//! Per-tank acquisition pipeline.
//!
//! `read_level()` runs one full acquisition (N samples, median, level map)
//! and returns a [`SensorReading`].  The pipeline keeps the last valid
//! reading so collaborators can still show a stale-but-good value while the
//! sensor is failing, and counts consecutive failures as an advisory health
//! signal.

use log::{info, warn};

use super::level;
use super::median::MedianAggregator;
use super::pulse_timer::RangeFinder;
use super::{SensorReading, TankId};
use crate::app::ports::ClockPort;
use crate::config::{CalibrationPair, SensorTuning};
use crate::error::{ConfigError, SensorError};

/// Consecutive failures at which the sensor is reported degraded.
pub const DEGRADED_AFTER: u32 = 5;

pub struct DistanceAcquisitionPipeline<R, C> {
    tank: TankId,
    ranger: R,
    clock: C,
    aggregator: MedianAggregator,
    calibration: CalibrationPair,
    last_good: Option<SensorReading>,
    last: SensorReading,
    consecutive_errors: u32,
}

impl<R: RangeFinder, C: ClockPort> DistanceAcquisitionPipeline<R, C> {
    pub fn new(
        tank: TankId,
        ranger: R,
        clock: C,
        calibration: CalibrationPair,
        tuning: &SensorTuning,
    ) -> Self {
        let mut p = Self {
            tank,
            ranger,
            clock,
            aggregator: MedianAggregator::new(tuning.sample_count, tuning.inter_sample_delay_ms),
            calibration,
            last_good: None,
            last: SensorReading::empty(),
            consecutive_errors: 0,
        };
        p.ranger.set_timeout_us(tuning.timeout_us);
        p
    }

    /// Prepare the ranging hardware.
    pub fn begin(&mut self) -> Result<(), SensorError> {
        self.ranger.begin()?;
        info!(
            "{:?}: sensor ready (empty={:.1}cm full={:.1}cm, {} samples)",
            self.tank,
            self.calibration.empty_cm,
            self.calibration.full_cm,
            self.aggregator.sample_count()
        );
        Ok(())
    }

    /// One blocking acquisition cycle.
    pub fn read_level(&mut self) -> SensorReading {
        let result = self.aggregator.aggregate(&mut self.ranger, &self.calibration);
        let now = self.clock.now_ms();

        let reading = match result {
            Ok(m) => {
                let pct = level::to_percent(m.distance_cm, &self.calibration);
                if self.consecutive_errors >= DEGRADED_AFTER {
                    info!(
                        "{:?}: sensor recovered after {} failures",
                        self.tank, self.consecutive_errors
                    );
                }
                self.consecutive_errors = 0;
                let r = SensorReading::valid(m.distance_cm, pct, now);
                self.last_good = Some(r);
                r
            }
            Err(e) => {
                self.consecutive_errors = self.consecutive_errors.saturating_add(1);
                warn!(
                    "{:?}: acquisition failed: {} ({} consecutive)",
                    self.tank, e, self.consecutive_errors
                );
                if self.consecutive_errors == DEGRADED_AFTER {
                    warn!("{:?}: sensor degraded", self.tank);
                }
                SensorReading::failed(e, now)
            }
        };
        self.last = reading;
        reading
    }

    pub fn tank(&self) -> TankId {
        self.tank
    }

    /// Most recent valid reading, if any.
    pub fn last_reading(&self) -> Option<&SensorReading> {
        self.last_good.as_ref()
    }

    /// Most recent reading, valid or not.
    pub fn latest(&self) -> &SensorReading {
        &self.last
    }

    /// Advisory: fewer than five consecutive failed acquisitions.
    pub fn is_healthy(&self) -> bool {
        self.consecutive_errors < DEGRADED_AFTER
    }

    pub fn error_count(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn reset_error_count(&mut self) {
        self.consecutive_errors = 0;
    }

    pub fn calibration(&self) -> CalibrationPair {
        self.calibration
    }

    /// Replace the calibration; an invalid pair is rejected and the current
    /// one kept.
    pub fn set_calibration(&mut self, calib: CalibrationPair) -> Result<(), ConfigError> {
        calib.validate()?;
        info!(
            "{:?}: calibration set (empty={:.1}cm full={:.1}cm)",
            self.tank, calib.empty_cm, calib.full_cm
        );
        self.calibration = calib;
        Ok(())
    }

    /// Clamped to 3–10.
    pub fn set_sample_count(&mut self, count: u8) {
        self.aggregator.set_sample_count(count);
    }

    pub fn sample_count(&self) -> u8 {
        self.aggregator.sample_count()
    }

    pub fn set_timeout_us(&mut self, timeout_us: u32) {
        self.ranger.set_timeout_us(timeout_us);
    }

    /// Apply sample count, timeout and inter-sample delay together.
    pub fn apply_tuning(&mut self, tuning: &SensorTuning) {
        self.aggregator.set_sample_count(tuning.sample_count);
        self.aggregator
            .set_inter_sample_delay_ms(tuning.inter_sample_delay_ms);
        self.ranger.set_timeout_us(tuning.timeout_us);
    }
}
