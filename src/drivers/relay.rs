//! Pump relay driver.
//!
//! A single digital output drives the relay coil (through a transistor or
//! opto-isolated module).  The driver is a dumb actuator: all interlocks live
//! in [`PumpController`](crate::control::pump::PumpController), which is the
//! only caller of [`ActuatorPort::set_actuator`].
//!
//! Generic over an `embedded-hal` [`OutputPin`], so the same driver runs on
//! an ESP-IDF `PinDriver` and on a host-side mock.

use embedded_hal::digital::OutputPin;
use log::{debug, error};

use crate::app::ports::ActuatorPort;

/// Coil polarity of the relay module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPolarity {
    /// Output HIGH energizes the coil.
    ActiveHigh,
    /// Output LOW energizes the coil (common on opto-isolated boards).
    ActiveLow,
}

pub struct PumpRelay<P> {
    pin: P,
    polarity: RelayPolarity,
    energized: bool,
    write_failures: u32,
}

impl<P: OutputPin> PumpRelay<P> {
    pub fn new(pin: P, polarity: RelayPolarity) -> Self {
        Self {
            pin,
            polarity,
            energized: false,
            write_failures: 0,
        }
    }

    /// Last state successfully written.
    pub fn is_energized(&self) -> bool {
        self.energized
    }

    /// GPIO writes that returned an error since boot.
    pub fn write_failures(&self) -> u32 {
        self.write_failures
    }

    fn drive(&mut self, energized: bool) -> Result<(), P::Error> {
        let high = match self.polarity {
            RelayPolarity::ActiveHigh => energized,
            RelayPolarity::ActiveLow => !energized,
        };
        if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }
}

impl<P: OutputPin> ActuatorPort for PumpRelay<P> {
    fn set_actuator(&mut self, energized: bool) {
        match self.drive(energized) {
            Ok(()) => {
                self.energized = energized;
                debug!("Relay: {}", if energized { "energized" } else { "released" });
            }
            Err(_) => {
                self.write_failures = self.write_failures.saturating_add(1);
                error!("Relay: GPIO write failed (wanted energized={})", energized);
            }
        }
    }
}
