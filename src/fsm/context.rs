//! Context threaded through every pump state handler.
//!
//! Update handlers only read it; enter/exit actions write the runtime
//! clock, relay intent and fault fields.  The controller refreshes `now_ms`
//! and `input` before each step.

use crate::config::{PumpConfig, PumpMode, SafetyThresholds};
use crate::error::PumpFault;

use super::PumpState;

/// Levels fed to one update step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInput {
    /// Tank fill level (%).  `None` when the reading was invalid; the
    /// machine then only enforces safety limits.
    pub level: Option<f32>,
    /// Source tank level (%).  100 in single-tank mode.
    pub source_level: f32,
}

impl Default for TickInput {
    fn default() -> Self {
        Self {
            level: None,
            source_level: 100.0,
        }
    }
}

pub struct FsmContext {
    // -- Timing --
    /// Milliseconds since boot at the current step.
    pub now_ms: u64,
    /// Stamped on entering `On`, cleared on leaving it.
    pub started_at_ms: Option<u64>,
    /// Stamped on entering `Cooldown`, cleared on leaving it.
    pub stopped_at_ms: Option<u64>,

    // -- Inputs --
    pub input: TickInput,

    // -- Configuration --
    pub thresholds: SafetyThresholds,
    pub mode: PumpMode,
    pub manual_dry_run_protection: bool,

    // -- Outputs --
    /// Desired relay state.  Written only by enter actions.
    pub relay_on: bool,
    /// Reason latched by the last emergency stop.
    pub fault: Option<PumpFault>,
    /// Last rejection or emergency reason, for status reporting.
    pub last_error: Option<PumpFault>,
}

impl FsmContext {
    pub fn new(cfg: &PumpConfig) -> Self {
        Self {
            now_ms: 0,
            started_at_ms: None,
            stopped_at_ms: None,
            input: TickInput::default(),
            thresholds: cfg.thresholds,
            mode: cfg.mode,
            manual_dry_run_protection: cfg.manual_dry_run_protection,
            relay_on: false,
            fault: None,
            last_error: None,
        }
    }

    /// Elapsed run time at `now_ms`; 0 unless running.
    pub fn run_time_ms(&self, now_ms: u64) -> u64 {
        self.started_at_ms
            .map_or(0, |t| now_ms.saturating_sub(t))
    }

    /// Remaining cooldown at `now_ms`; 0 unless cooling down.
    pub fn cooldown_remaining_ms(&self, now_ms: u64) -> u64 {
        self.stopped_at_ms.map_or(0, |t| {
            u64::from(self.thresholds.cooldown_time_ms).saturating_sub(now_ms.saturating_sub(t))
        })
    }

    pub fn cooldown_elapsed(&self, now_ms: u64) -> bool {
        self.cooldown_remaining_ms(now_ms) == 0
    }

    /// Whether a start request is allowed from `state`.
    pub fn can_start(&self, state: PumpState, now_ms: u64) -> Result<(), PumpFault> {
        match state {
            PumpState::On => Err(PumpFault::AlreadyRunning),
            PumpState::Error => Err(PumpFault::LatchedError),
            PumpState::Cooldown if !self.cooldown_elapsed(now_ms) => Err(PumpFault::InCooldown),
            PumpState::Cooldown | PumpState::Off => Ok(()),
        }
    }

    pub fn min_run_elapsed(&self, now_ms: u64) -> bool {
        self.run_time_ms(now_ms) >= u64::from(self.thresholds.min_run_time_ms)
    }

    /// Maximum run time reached.  Never true before the minimum run time.
    pub fn should_stop(&self, now_ms: u64) -> bool {
        if !self.min_run_elapsed(now_ms) {
            return false;
        }
        self.run_time_ms(now_ms) >= u64::from(self.thresholds.max_run_time_ms)
    }

    /// Source level is at or above the dry-run threshold.
    pub fn is_safe(&self, source_level: f32) -> bool {
        source_level >= self.thresholds.dry_run_threshold
    }

    /// Dry-run protection applies in the current mode.
    pub fn dry_run_guarded(&self) -> bool {
        self.mode == PumpMode::Automatic || self.manual_dry_run_protection
    }

    /// Reason used when the run-time limit trips.
    pub fn run_limit_fault(&self) -> PumpFault {
        match self.mode {
            PumpMode::Automatic => PumpFault::MaxRunTimeExceeded,
            PumpMode::Manual => PumpFault::SafetyLimitReached,
        }
    }
}
