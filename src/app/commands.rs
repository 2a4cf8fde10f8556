//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (MQTT, web UI,
//! serial console) that the [`AppService`](super::service::AppService)
//! interprets and acts upon.  Every pump command goes through the same
//! interlocks as the automatic path.

use core::fmt;
use core::str::FromStr;

use crate::config::{CalibrationPair, PumpMode, SystemConfig};
use crate::sensors::TankId;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Manual start request.
    PumpOn,
    /// Manual stop request.
    PumpOff,
    /// Switch between manual and automatic control.  `Manual` also clears
    /// a latched fault.
    SetMode(PumpMode),
    /// Clear a latched fault without changing mode.
    ResetFault,
    /// Replace the auto-on / auto-off pair (%).
    SetThresholds { on: f32, off: f32 },
    /// Recalibrate one tank.
    SetCalibration { tank: TankId, calibration: CalibrationPair },
    /// Replace the whole configuration between cycles.
    UpdateConfig(Box<SystemConfig>),
    /// Persist the current configuration at the next save check.
    SaveConfig,
}

/// Text that does not name a known command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownCommand;

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown command")
    }
}

impl std::error::Error for UnknownCommand {}

/// Plain-text commands as received on the remote command topic.
impl FromStr for AppCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pump_on" | "on" => Ok(Self::PumpOn),
            "pump_off" | "off" => Ok(Self::PumpOff),
            "auto" => Ok(Self::SetMode(PumpMode::Automatic)),
            "manual" => Ok(Self::SetMode(PumpMode::Manual)),
            "reset" => Ok(Self::ResetFault),
            "save" => Ok(Self::SaveConfig),
            _ => Err(UnknownCommand),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_remote_commands() {
        assert_eq!("pump_on".parse(), Ok(AppCommand::PumpOn));
        assert_eq!("pump_off\n".parse(), Ok(AppCommand::PumpOff));
        assert_eq!(
            "AUTO".parse(),
            Ok(AppCommand::SetMode(PumpMode::Automatic))
        );
        assert_eq!(
            " manual ".parse(),
            Ok(AppCommand::SetMode(PumpMode::Manual))
        );
        assert_eq!("reset".parse(), Ok(AppCommand::ResetFault));
        assert_eq!("save".parse(), Ok(AppCommand::SaveConfig));
    }

    #[test]
    fn rejects_unknown() {
        assert_eq!("pump_sideways".parse::<AppCommand>(), Err(UnknownCommand));
        assert_eq!("".parse::<AppCommand>(), Err(UnknownCommand));
    }
}
