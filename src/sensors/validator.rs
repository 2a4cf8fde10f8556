//! Per-sample plausibility gate.
//!
//! Acceptance depends only on the absolute sensor range.  Whether a sample
//! sits inside the calibrated band is reported separately so the caller can
//! log it; an out-of-band sample is still accepted.

use crate::config::{CalibrationPair, SENSOR_MAX_CM, SENSOR_MIN_CM};

/// Slack around the calibrated band before a sample is flagged (cm).
pub const BAND_TOLERANCE_CM: f32 = 10.0;

/// Result of checking one raw sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleVerdict {
    /// Inside the absolute sensor range; the sample is used.
    pub plausible: bool,
    /// Outside `[full - tol, empty + tol]`; diagnostic only.
    pub outside_band: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SampleValidator {
    min_cm: f32,
    max_cm: f32,
    tolerance_cm: f32,
}

impl Default for SampleValidator {
    fn default() -> Self {
        Self {
            min_cm: SENSOR_MIN_CM,
            max_cm: SENSOR_MAX_CM,
            tolerance_cm: BAND_TOLERANCE_CM,
        }
    }
}

impl SampleValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inside the absolute sensor range.  Negative timeout sentinels and
    /// NaN are rejected too.
    pub fn is_plausible(&self, distance_cm: f32) -> bool {
        distance_cm >= self.min_cm && distance_cm <= self.max_cm
    }

    /// Outside the calibrated band widened by the tolerance.
    pub fn is_outside_band(&self, distance_cm: f32, calib: &CalibrationPair) -> bool {
        distance_cm < calib.full_cm - self.tolerance_cm
            || distance_cm > calib.empty_cm + self.tolerance_cm
    }

    pub fn check(&self, distance_cm: f32, calib: &CalibrationPair) -> SampleVerdict {
        SampleVerdict {
            plausible: self.is_plausible(distance_cm),
            outside_band: self.is_outside_band(distance_cm, calib),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calib() -> CalibrationPair {
        CalibrationPair::new(100.0, 20.0).unwrap()
    }

    #[test]
    fn absolute_range_is_inclusive() {
        let v = SampleValidator::new();
        assert!(v.is_plausible(5.0));
        assert!(v.is_plausible(500.0));
        assert!(!v.is_plausible(4.99));
        assert!(!v.is_plausible(500.01));
    }

    #[test]
    fn sentinels_rejected() {
        let v = SampleValidator::new();
        assert!(!v.is_plausible(-1.0));
        assert!(!v.is_plausible(f32::NAN));
    }

    #[test]
    fn out_of_band_is_flagged_but_accepted() {
        let v = SampleValidator::new();
        let verdict = v.check(150.0, &calib());
        assert!(verdict.plausible);
        assert!(verdict.outside_band);

        let verdict = v.check(8.0, &calib());
        assert!(verdict.plausible);
        assert!(verdict.outside_band);
    }

    #[test]
    fn band_edges_use_tolerance() {
        let v = SampleValidator::new();
        assert!(!v.is_outside_band(10.0, &calib()));
        assert!(!v.is_outside_band(110.0, &calib()));
        assert!(v.is_outside_band(9.9, &calib()));
        assert!(v.is_outside_band(110.1, &calib()));
    }

    #[test]
    fn implausible_in_band_is_independent() {
        let v = SampleValidator::new();
        let wide = CalibrationPair::new(500.0, 5.0).unwrap();
        let verdict = v.check(600.0, &wide);
        assert!(!verdict.plausible);
        assert!(verdict.outside_band);
        let verdict = v.check(2.0, &wide);
        assert!(!verdict.plausible);
        assert!(!verdict.outside_band);
    }
}
