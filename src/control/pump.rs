//! Pump controller: the single owner of the pump relay.
//!
//! Wraps the pump [`Fsm`] and applies its relay intent to an
//! [`ActuatorPort`].  Every public operation takes `&mut self`, runs the
//! state change and the relay write in one call, and writes the relay only
//! when the intent actually changes, so the recorded [`PumpState`] and the
//! physical relay never disagree between calls.
//!
//! All requests return `Result<(), PumpFault>`.  A rejection is an ordinary
//! value: it is logged, kept as `last_error` and handed back to the caller.

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::{ActuatorPort, ClockPort};
use crate::config::{PumpConfig, PumpMode, SafetyThresholds};
use crate::error::{ConfigError, PumpFault};
use crate::fsm::context::{FsmContext, TickInput};
use crate::fsm::{Fsm, PumpState, Transition, states};

/// Read-only snapshot for telemetry and display collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PumpStatus {
    pub state: PumpState,
    pub mode: PumpMode,
    pub is_running: bool,
    pub run_time_ms: u64,
    pub cooldown_remaining_ms: u64,
    pub last_error: Option<PumpFault>,
}

pub struct PumpController<A, C> {
    actuator: A,
    clock: C,
    fsm: Fsm,
    ctx: FsmContext,
    /// Last value written to the actuator.
    energized: bool,
}

impl<A: ActuatorPort, C: ClockPort> PumpController<A, C> {
    pub fn new(actuator: A, clock: C, cfg: &PumpConfig) -> Self {
        Self {
            actuator,
            clock,
            fsm: Fsm::new(states::build_state_table(), PumpState::Off),
            ctx: FsmContext::new(cfg),
            energized: false,
        }
    }

    /// Force the relay off and enter `Off`.  Call once at startup.
    pub fn begin(&mut self) {
        self.sync_clock();
        self.fsm.start(&mut self.ctx);
        self.actuator.set_actuator(false);
        self.energized = false;
        info!(
            "Pump controller ready ({:?} mode, on<={:.0}% off>={:.0}%)",
            self.ctx.mode,
            self.ctx.thresholds.auto_on_threshold,
            self.ctx.thresholds.auto_off_threshold
        );
    }

    // ── Requests ────────────────────────────────────────────────

    /// Manual start request.  Subject to the same interlocks as the
    /// automatic path.
    pub fn turn_on(&mut self) -> Result<(), PumpFault> {
        let now = self.sync_clock();
        let state = self.fsm.current_state();
        if let Err(fault) = self.ctx.can_start(state, now) {
            return Err(self.reject(fault));
        }
        if self.ctx.dry_run_guarded() && !self.ctx.is_safe(self.ctx.input.source_level) {
            return Err(self.reject(PumpFault::SourceTooLow));
        }
        self.fsm.force_transition(PumpState::On, &mut self.ctx);
        self.apply_relay();
        Ok(())
    }

    /// Manual stop request.  Valid only while `On`; exempt from the minimum
    /// run time.
    pub fn turn_off(&mut self) -> Result<(), PumpFault> {
        self.sync_clock();
        if self.fsm.current_state() != PumpState::On {
            return Err(PumpFault::NotRunning);
        }
        self.fsm.force_transition(PumpState::Cooldown, &mut self.ctx);
        self.apply_relay();
        Ok(())
    }

    /// Periodic tick with a valid tank level.
    ///
    /// Returns `Err` only when this tick emergency-stopped the pump.
    pub fn update(&mut self, current_level: f32, source_level: f32) -> Result<(), PumpFault> {
        self.step(TickInput {
            level: Some(current_level),
            source_level,
        })
    }

    /// Periodic tick without a trustworthy tank level: no automatic start
    /// or level-based stop, but run-time and dry-run limits still apply.
    pub fn supervise(&mut self, source_level: f32) -> Result<(), PumpFault> {
        self.step(TickInput {
            level: None,
            source_level,
        })
    }

    /// De-energize immediately and latch `reason`.  Only a running pump
    /// can be stopped this way; returns whether the fault was latched.
    pub fn emergency_stop(&mut self, reason: PumpFault) -> bool {
        self.sync_clock();
        let tripped = self.fsm.trip(reason, &mut self.ctx);
        self.apply_relay();
        tripped
    }

    /// Clear a latched fault back to `Off`.  Returns whether a fault was
    /// cleared.
    pub fn reset_fault(&mut self) -> bool {
        if self.fsm.current_state() != PumpState::Error {
            return false;
        }
        self.sync_clock();
        self.fsm.force_transition(PumpState::Off, &mut self.ctx);
        self.apply_relay();
        true
    }

    /// Switching to `Manual` also clears a latched fault.
    pub fn set_mode(&mut self, mode: PumpMode) {
        if self.ctx.mode != mode {
            info!("Pump mode: {:?} -> {:?}", self.ctx.mode, mode);
        }
        self.ctx.mode = mode;
        if mode == PumpMode::Manual {
            self.reset_fault();
        }
    }

    /// Replace the auto-on/auto-off pair.  Rejected unless
    /// `0 <= on < off <= 100`.
    pub fn set_thresholds(&mut self, on: f32, off: f32) -> Result<(), ConfigError> {
        let next = SafetyThresholds {
            auto_on_threshold: on,
            auto_off_threshold: off,
            ..self.ctx.thresholds
        };
        next.validate()?;
        self.ctx.thresholds = next;
        info!("Pump thresholds: on<={:.1}% off>={:.1}%", on, off);
        Ok(())
    }

    /// Apply a pump configuration between cycles.  A mode change goes
    /// through [`set_mode`](Self::set_mode).
    pub fn apply_config(&mut self, cfg: &PumpConfig) -> Result<(), ConfigError> {
        cfg.thresholds.validate()?;
        self.ctx.thresholds = cfg.thresholds;
        self.ctx.manual_dry_run_protection = cfg.manual_dry_run_protection;
        if cfg.mode != self.ctx.mode {
            self.set_mode(cfg.mode);
        }
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────

    pub fn state(&self) -> PumpState {
        self.fsm.current_state()
    }

    pub fn mode(&self) -> PumpMode {
        self.ctx.mode
    }

    pub fn thresholds(&self) -> &SafetyThresholds {
        &self.ctx.thresholds
    }

    pub fn is_running(&self) -> bool {
        self.fsm.current_state() == PumpState::On
    }

    pub fn can_start(&self) -> bool {
        self.ctx
            .can_start(self.fsm.current_state(), self.clock.now_ms())
            .is_ok()
    }

    pub fn should_stop(&self) -> bool {
        self.ctx.should_stop(self.clock.now_ms())
    }

    pub fn is_safe(&self, source_level: f32) -> bool {
        self.ctx.is_safe(source_level)
    }

    pub fn run_time_ms(&self) -> u64 {
        self.ctx.run_time_ms(self.clock.now_ms())
    }

    pub fn cooldown_remaining_ms(&self) -> u64 {
        self.ctx.cooldown_remaining_ms(self.clock.now_ms())
    }

    pub fn last_error(&self) -> Option<PumpFault> {
        self.ctx.last_error
    }

    pub fn status(&self) -> PumpStatus {
        let now = self.clock.now_ms();
        PumpStatus {
            state: self.fsm.current_state(),
            mode: self.ctx.mode,
            is_running: self.is_running(),
            run_time_ms: self.ctx.run_time_ms(now),
            cooldown_remaining_ms: self.ctx.cooldown_remaining_ms(now),
            last_error: self.ctx.last_error,
        }
    }

    /// The actuator, for inspection by the embedding code.
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    // ── Internal ────────────────────────────────────────────────

    fn sync_clock(&mut self) -> u64 {
        let now = self.clock.now_ms();
        self.ctx.now_ms = now;
        now
    }

    fn step(&mut self, input: TickInput) -> Result<(), PumpFault> {
        self.sync_clock();
        self.ctx.input = input;
        let decision = self.fsm.tick(&mut self.ctx);
        self.apply_relay();
        match decision {
            Some(Transition::Trip(fault)) => Err(fault),
            _ => Ok(()),
        }
    }

    fn reject(&mut self, fault: PumpFault) -> PumpFault {
        warn!("Pump request rejected: {}", fault);
        self.ctx.last_error = Some(fault);
        fault
    }

    fn apply_relay(&mut self) {
        if self.ctx.relay_on != self.energized {
            self.actuator.set_actuator(self.ctx.relay_on);
            self.energized = self.ctx.relay_on;
        }
    }
}
