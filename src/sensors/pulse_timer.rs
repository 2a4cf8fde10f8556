//! Ultrasonic trigger/echo ranging (JSN-SR04T / HC-SR04 style).
//!
//! A 10 µs trigger pulse starts a burst; the sensor holds its echo line HIGH
//! for the round-trip time of flight.  The echo is timed by polling against
//! a monotonic microsecond clock with a hard deadline, so a single
//! measurement never blocks longer than the configured timeout.
//!
//! ## Dual-target design
//!
//! The timer is generic over `embedded-hal` pins and delay plus a
//! [`ClockPort`]: on ESP-IDF these are `PinDriver`s, `Ets` and the
//! `esp_timer` clock; on host tests they are simulated.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::debug;

use crate::app::ports::ClockPort;
use crate::error::SensorError;

/// Speed of sound at 20 °C in cm/µs.
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0343;

/// Default echo timeout (µs).
pub const DEFAULT_TIMEOUT_US: u32 = 30_000;

const TRIGGER_SETTLE_US: u32 = 2;
const TRIGGER_PULSE_US: u32 = 10;
const POWER_ON_SETTLE_MS: u32 = 50;

/// Convert a round-trip echo pulse width to a one-way distance.
pub fn echo_width_to_cm(width_us: u64) -> f32 {
    (width_us as f32 / 2.0) * SPEED_OF_SOUND_CM_PER_US
}

/// Anything that can produce one raw distance measurement.
///
/// [`MedianAggregator`](super::median::MedianAggregator) and the acquisition
/// pipeline only see this trait, which keeps them testable with scripted
/// sample sequences.
pub trait RangeFinder {
    /// One blocking measurement, bounded by the ranger's timeout.
    fn measure(&mut self) -> Result<f32, SensorError>;

    /// Block for `ms` between measurements (acoustic cross-talk guard).
    fn pause_ms(&mut self, ms: u32);

    /// Replace the per-measurement echo timeout.
    fn set_timeout_us(&mut self, timeout_us: u32);

    /// One-time hardware preparation.
    fn begin(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

/// Trigger/echo pulse timer for one ranging device.
pub struct PulseTimer<T, E, D, C> {
    trig: T,
    echo: E,
    delay: D,
    clock: C,
    timeout_us: u32,
}

impl<T, E, D, C> PulseTimer<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: ClockPort,
{
    pub fn new(trig: T, echo: E, delay: D, clock: C) -> Self {
        Self {
            trig,
            echo,
            delay,
            clock,
            timeout_us: DEFAULT_TIMEOUT_US,
        }
    }

    pub fn timeout_us(&self) -> u32 {
        self.timeout_us
    }

    /// Emit the trigger pulse: LOW 2 µs, HIGH 10 µs, LOW.
    fn trigger(&mut self) -> Result<(), SensorError> {
        self.trig.set_low().map_err(|_| SensorError::Hardware)?;
        self.delay.delay_us(TRIGGER_SETTLE_US);
        self.trig.set_high().map_err(|_| SensorError::Hardware)?;
        self.delay.delay_us(TRIGGER_PULSE_US);
        self.trig.set_low().map_err(|_| SensorError::Hardware)
    }

    fn echo_high(&mut self) -> Result<bool, SensorError> {
        self.echo.is_high().map_err(|_| SensorError::Hardware)
    }

    /// Time the echo pulse.  A pulse already in progress is let through
    /// first; every wait shares one deadline.
    fn echo_width_us(&mut self) -> Result<u64, SensorError> {
        let deadline = self.clock.now_us() + u64::from(self.timeout_us);

        while self.echo_high()? {
            if self.clock.now_us() >= deadline {
                return Err(SensorError::Timeout);
            }
        }
        while !self.echo_high()? {
            if self.clock.now_us() >= deadline {
                return Err(SensorError::Timeout);
            }
        }
        let rise = self.clock.now_us();

        while self.echo_high()? {
            if self.clock.now_us() >= deadline {
                return Err(SensorError::Timeout);
            }
        }
        Ok(self.clock.now_us().saturating_sub(rise))
    }
}

impl<T, E, D, C> RangeFinder for PulseTimer<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: ClockPort,
{
    fn measure(&mut self) -> Result<f32, SensorError> {
        self.trigger()?;
        let width = self.echo_width_us()?;
        let distance = echo_width_to_cm(width);
        debug!("PulseTimer: echo {}us -> {:.2}cm", width, distance);
        Ok(distance)
    }

    fn pause_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    fn set_timeout_us(&mut self, timeout_us: u32) {
        self.timeout_us = timeout_us;
    }

    fn begin(&mut self) -> Result<(), SensorError> {
        self.trig.set_low().map_err(|_| SensorError::Hardware)?;
        self.delay.delay_ms(POWER_ON_SETTLE_MS);
        Ok(())
    }
}
