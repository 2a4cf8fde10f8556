//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements  | Connects to            |
//! |------------|-------------|------------------------|
//! | `log_sink` | EventSink   | Serial log output      |
//! | `nvs`      | ConfigPort  | NVS / in-memory store  |
//! | `time`     | ClockPort   | ESP32 system timer     |
//!
//! The relay [`ActuatorPort`](crate::app::ports::ActuatorPort) adapter
//! lives in [`drivers::relay`](crate::drivers::relay).

pub mod log_sink;
pub mod nvs;
pub mod time;
