//! Actuator control.

pub mod pump;
