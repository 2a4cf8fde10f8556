//! Function-pointer finite state machine for the pump.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌──────────┬───────────┬──────────┬──────────────────────┐  │
//! │  │ PumpState │ on_enter  │ on_exit  │ on_update            │  │
//! │  ├──────────┼───────────┼──────────┼──────────────────────┤  │
//! │  │ Off       │ fn(ctx)   │ —        │ fn(&ctx)->Option<T>  │  │
//! │  │ On        │ fn(ctx)   │ fn(ctx)  │ fn(&ctx)->Option<T>  │  │
//! │  │ Cooldown  │ fn(ctx)   │ fn(ctx)  │ fn(&ctx)->Option<T>  │  │
//! │  │ Error     │ fn(ctx)   │ fn(ctx)  │ fn(&ctx)->Option<T>  │  │
//! │  └──────────┴───────────┴──────────┴──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! `on_update` is a pure decision: it reads the context (inputs, thresholds,
//! runtime clock) and returns a [`Transition`] or `None`.  The engine then
//! runs `on_exit` for the current state and `on_enter` for the next one;
//! the enter actions are the only place the relay intent changes.
//!
//! The engine never touches hardware.
//! [`PumpController`](crate::control::pump::PumpController) applies the
//! relay intent after each step, inside the same `&mut self` call.

pub mod context;
pub mod states;

use context::FsmContext;
use log::{debug, info};
use serde::Serialize;

use crate::error::PumpFault;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Pump states.  Must stay in sync with [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum PumpState {
    Off = 0,
    On = 1,
    Cooldown = 2,
    /// Latched fault; left only by an explicit reset.
    Error = 3,
}

impl PumpState {
    pub const COUNT: usize = 4;

    /// Convert an index back to `PumpState`.  Out-of-range indices map to
    /// `Error`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Off,
            1 => Self::On,
            2 => Self::Cooldown,
            3 => Self::Error,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Error
            }
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
            Self::Cooldown => "COOLDOWN",
            Self::Error => "ERROR",
        }
    }
}

impl core::fmt::Display for PumpState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision returned by a state's update handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to another state normally.
    Go(PumpState),
    /// Emergency stop: latch the fault and enter `Error`.
    Trip(PumpFault),
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit` action.  Runs exactly once per transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Per-tick decision.  Must not mutate anything.
pub type StateUpdateFn = fn(&FsmContext) -> Option<Transition>;

/// One row in the state table.
pub struct StateDescriptor {
    pub id: PumpState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Indexed by `PumpState as usize`.
    table: [StateDescriptor; PumpState::COUNT],
    current: usize,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; PumpState::COUNT], initial: PumpState) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("Pump FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Evaluate the current state's update handler and apply its decision.
    /// Returns the decision, if any.
    pub fn tick(&mut self, ctx: &mut FsmContext) -> Option<Transition> {
        let decision = (self.table[self.current].on_update)(ctx);
        match decision {
            Some(Transition::Go(next)) => self.transition(next, ctx),
            Some(Transition::Trip(fault)) => {
                self.trip(fault, ctx);
            }
            None => {}
        }
        decision
    }

    /// Transition on an external request (manual on/off, reset).
    pub fn force_transition(&mut self, next: PumpState, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// Latch `fault` and enter `Error`.  Only a running pump can trip;
    /// from any other state nothing changes and `false` is returned.
    pub fn trip(&mut self, fault: PumpFault, ctx: &mut FsmContext) -> bool {
        if self.current_state() != PumpState::On {
            debug!(
                "Ignoring trip ({}) in state {}",
                fault, self.table[self.current].name
            );
            return false;
        }
        ctx.fault = Some(fault);
        self.transition(PumpState::Error, ctx);
        true
    }

    pub fn current_state(&self) -> PumpState {
        PumpState::from_index(self.current)
    }

    fn transition(&mut self, next: PumpState, ctx: &mut FsmContext) {
        let next_idx = next as usize;

        info!(
            "Pump: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }
        self.current = next_idx;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
