//! Actuator drivers and platform helpers.

pub mod relay;
pub mod watchdog;
