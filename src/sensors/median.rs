//! Median-of-N outlier filter with a quorum rule.
//!
//! Each acquisition takes `sample_count` raw measurements, drops the
//! implausible ones and returns the median of the survivors.  Fewer than
//! [`QUORUM`] survivors is a failed acquisition:
//!
//! | valid samples | result              |
//! |---------------|---------------------|
//! | 0             | `Timeout`           |
//! | 1–2           | `OutOfRange`        |
//! | ≥ 3           | median              |

use heapless::Vec;
use log::{debug, warn};

use super::pulse_timer::RangeFinder;
use super::validator::SampleValidator;
use crate::config::{CalibrationPair, SAMPLE_COUNT_MAX, SAMPLE_COUNT_MIN};
use crate::error::SensorError;

/// Minimum number of valid samples for a trustworthy median.
pub const QUORUM: usize = 3;

/// Default pause between measurements (ms).
pub const DEFAULT_INTER_SAMPLE_DELAY_MS: u32 = 10;

type SampleBuf = Vec<f32, { SAMPLE_COUNT_MAX as usize }>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MedianResult {
    pub distance_cm: f32,
    pub valid_count: u8,
}

/// Median of `samples`, sorting them in place.  Even counts average the two
/// middle elements.
pub fn median(samples: &mut [f32]) -> Option<f32> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_unstable_by(f32::total_cmp);
    let mid = samples.len() / 2;
    if samples.len() % 2 == 0 {
        Some((samples[mid - 1] + samples[mid]) / 2.0)
    } else {
        Some(samples[mid])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MedianAggregator {
    validator: SampleValidator,
    sample_count: u8,
    inter_sample_delay_ms: u32,
}

impl Default for MedianAggregator {
    fn default() -> Self {
        Self {
            validator: SampleValidator::default(),
            sample_count: 5,
            inter_sample_delay_ms: DEFAULT_INTER_SAMPLE_DELAY_MS,
        }
    }
}

impl MedianAggregator {
    pub fn new(sample_count: u8, inter_sample_delay_ms: u32) -> Self {
        let mut agg = Self {
            inter_sample_delay_ms,
            ..Self::default()
        };
        agg.set_sample_count(sample_count);
        agg
    }

    pub fn sample_count(&self) -> u8 {
        self.sample_count
    }

    /// Clamped to 3–10.
    pub fn set_sample_count(&mut self, count: u8) {
        self.sample_count = count.clamp(SAMPLE_COUNT_MIN, SAMPLE_COUNT_MAX);
    }

    pub fn set_inter_sample_delay_ms(&mut self, ms: u32) {
        self.inter_sample_delay_ms = ms;
    }

    /// Take `sample_count` measurements from `ranger` and filter them.
    pub fn aggregate<R: RangeFinder>(
        &self,
        ranger: &mut R,
        calib: &CalibrationPair,
    ) -> Result<MedianResult, SensorError> {
        let delay = self.inter_sample_delay_ms;
        let samples = (0..self.sample_count).map(|i| {
            if i > 0 {
                ranger.pause_ms(delay);
            }
            ranger.measure()
        });
        self.aggregate_samples(samples, calib)
    }

    /// Filter an already-collected sample sequence.  Failed measurements
    /// count as invalid samples.
    pub fn aggregate_samples<I>(
        &self,
        samples: I,
        calib: &CalibrationPair,
    ) -> Result<MedianResult, SensorError>
    where
        I: IntoIterator<Item = Result<f32, SensorError>>,
    {
        let mut valid = SampleBuf::new();
        let mut taken = 0usize;
        let mut hardware_faults = 0usize;

        for sample in samples.into_iter().take(SAMPLE_COUNT_MAX as usize) {
            taken += 1;
            let distance = match sample {
                Ok(d) => d,
                Err(SensorError::Hardware) => {
                    hardware_faults += 1;
                    continue;
                }
                Err(_) => continue,
            };
            let verdict = self.validator.check(distance, calib);
            if verdict.outside_band {
                debug!(
                    "Sample {:.2}cm outside calibrated range ({:.1}-{:.1}cm)",
                    distance, calib.full_cm, calib.empty_cm
                );
            }
            if verdict.plausible {
                // Capacity equals the `take` bound.
                let _ = valid.push(distance);
            }
        }

        let valid_count = valid.len();
        if valid_count < QUORUM {
            let err = match valid_count {
                0 if taken > 0 && hardware_faults == taken => SensorError::Hardware,
                0 => SensorError::Timeout,
                _ => SensorError::OutOfRange,
            };
            warn!(
                "Median: quorum not met ({}/{} valid) -> {}",
                valid_count, taken, err
            );
            return Err(err);
        }

        let distance_cm = median(&mut valid).ok_or(SensorError::Timeout)?;
        Ok(MedianResult {
            distance_cm,
            valid_count: valid_count as u8,
        })
    }
}
