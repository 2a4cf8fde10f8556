//! Fuzz target: median filtering of raw ranging samples
//!
//! Interprets the input as a sequence of f32 samples (NaN and infinities
//! included) and verifies:
//! - No panics
//! - A successful result lies within the plausible sensor range
//! - `valid_count` never exceeds the number of samples taken
//!
//! cargo fuzz run fuzz_median

#![no_main]

use libfuzzer_sys::fuzz_target;
use tankwatch::config::{CalibrationPair, SAMPLE_COUNT_MAX, SENSOR_MAX_CM, SENSOR_MIN_CM};
use tankwatch::sensors::median::MedianAggregator;

fuzz_target!(|data: &[u8]| {
    let samples: Vec<_> = data
        .chunks_exact(4)
        .map(|c| Ok(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
        .collect();
    let taken = samples.len().min(SAMPLE_COUNT_MAX as usize);

    let agg = MedianAggregator::default();
    if let Ok(r) = agg.aggregate_samples(samples, &CalibrationPair::default()) {
        assert!((SENSOR_MIN_CM..=SENSOR_MAX_CM).contains(&r.distance_cm));
        assert!(r.valid_count as usize <= taken);
    }
});
