//! Distance ↔ fill-level mapping.
//!
//! Linear and inverted: the sensor looks down, so a shorter distance means a
//! fuller tank.
//!
//! ```text
//!   distance ≤ full   → 100 %
//!   distance ≥ empty  →   0 %
//!   otherwise         → 100 − (d − full) / (empty − full) × 100
//! ```
//!
//! Both directions are pure and clamp their input range.

use crate::config::CalibrationPair;

/// Fill percentage (0–100) for a distance.
pub fn to_percent(distance_cm: f32, calib: &CalibrationPair) -> f32 {
    if distance_cm <= calib.full_cm {
        return 100.0;
    }
    if distance_cm >= calib.empty_cm {
        return 0.0;
    }
    let pct = 100.0 - (distance_cm - calib.full_cm) / calib.span_cm() * 100.0;
    pct.clamp(0.0, 100.0)
}

/// Distance that corresponds to a fill percentage; `percent` is clamped to
/// 0–100 first.
pub fn to_distance(percent: f32, calib: &CalibrationPair) -> f32 {
    let pct = percent.clamp(0.0, 100.0);
    calib.full_cm + (100.0 - pct) / 100.0 * calib.span_cm()
}
