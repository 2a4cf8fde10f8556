//! Pump state handlers and table builder.
//!
//! ```text
//!   OFF ──[level ≤ on, source safe, auto]──▶ ON
//!    ▲                                        │
//!    │                          [level ≥ off, run ≥ min]
//!    │                                        ▼
//!    └───────────[cooldown elapsed]──── COOLDOWN
//!
//!   ON ──[source < dry-run | run ≥ max]──▶ ERROR ──[reset]──▶ OFF
//! ```
//!
//! Manual `turn_on` / `turn_off` and resets are applied by the controller
//! through `Fsm::force_transition`; the handlers here cover the periodic
//! tick only.

use super::context::FsmContext;
use super::{PumpState, StateDescriptor, Transition};
use crate::config::PumpMode;
use crate::error::PumpFault;
use log::{debug, error, info};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; PumpState::COUNT] {
    [
        StateDescriptor {
            id: PumpState::Off,
            name: "OFF",
            on_enter: Some(off_enter),
            on_exit: None,
            on_update: off_update,
        },
        StateDescriptor {
            id: PumpState::On,
            name: "ON",
            on_enter: Some(on_enter),
            on_exit: Some(on_exit),
            on_update: on_update,
        },
        StateDescriptor {
            id: PumpState::Cooldown,
            name: "COOLDOWN",
            on_enter: Some(cooldown_enter),
            on_exit: Some(cooldown_exit),
            on_update: cooldown_update,
        },
        StateDescriptor {
            id: PumpState::Error,
            name: "ERROR",
            on_enter: Some(error_enter),
            on_exit: Some(error_exit),
            on_update: error_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  OFF
// ═══════════════════════════════════════════════════════════════════════════

fn off_enter(ctx: &mut FsmContext) {
    ctx.relay_on = false;
}

fn off_update(ctx: &FsmContext) -> Option<Transition> {
    if ctx.mode != PumpMode::Automatic {
        return None;
    }
    let level = ctx.input.level?;
    if level > ctx.thresholds.auto_on_threshold {
        return None;
    }
    if !ctx.is_safe(ctx.input.source_level) {
        debug!(
            "OFF: level {:.1}% wants start, source {:.1}% below dry-run limit",
            level, ctx.input.source_level
        );
        return None;
    }
    Some(Transition::Go(PumpState::On))
}

// ═══════════════════════════════════════════════════════════════════════════
//  ON
// ═══════════════════════════════════════════════════════════════════════════

fn on_enter(ctx: &mut FsmContext) {
    ctx.relay_on = true;
    ctx.started_at_ms = Some(ctx.now_ms);
    info!("ON: pump started ({:?} mode)", ctx.mode);
}

fn on_exit(ctx: &mut FsmContext) {
    info!("ON: pump ran {} ms", ctx.run_time_ms(ctx.now_ms));
    ctx.started_at_ms = None;
}

fn on_update(ctx: &FsmContext) -> Option<Transition> {
    let now = ctx.now_ms;

    if ctx.dry_run_guarded() && !ctx.is_safe(ctx.input.source_level) {
        return Some(Transition::Trip(PumpFault::SourceTooLow));
    }

    if ctx.mode == PumpMode::Automatic {
        if let Some(level) = ctx.input.level {
            if level >= ctx.thresholds.auto_off_threshold && ctx.min_run_elapsed(now) {
                return Some(Transition::Go(PumpState::Cooldown));
            }
        }
    }

    if ctx.should_stop(now) {
        return Some(Transition::Trip(ctx.run_limit_fault()));
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  COOLDOWN
// ═══════════════════════════════════════════════════════════════════════════

fn cooldown_enter(ctx: &mut FsmContext) {
    ctx.relay_on = false;
    ctx.stopped_at_ms = Some(ctx.now_ms);
}

fn cooldown_exit(ctx: &mut FsmContext) {
    ctx.stopped_at_ms = None;
}

fn cooldown_update(ctx: &FsmContext) -> Option<Transition> {
    ctx.cooldown_elapsed(ctx.now_ms)
        .then_some(Transition::Go(PumpState::Off))
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR — latched until reset
// ═══════════════════════════════════════════════════════════════════════════

fn error_enter(ctx: &mut FsmContext) {
    ctx.relay_on = false;
    ctx.last_error = ctx.fault;
    match ctx.fault {
        Some(f) => error!("EMERGENCY STOP: {}", f),
        None => error!("EMERGENCY STOP"),
    }
}

fn error_exit(ctx: &mut FsmContext) {
    info!("ERROR: fault cleared by reset");
    ctx.fault = None;
}

fn error_update(_ctx: &FsmContext) -> Option<Transition> {
    None
}
