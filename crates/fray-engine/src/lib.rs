//! Fray Engine -- deterministic fighter simulation with a fixed-step tick driver.
//!
//! This crate builds on [`fray_core`], [`fray_defs`] and [`fray_script`] to
//! run a match: fighters driven by a per-state transition table and scripted
//! actions, a physics integrator that moves them through a [`Stage`](stage::Stage),
//! and a collision resolver that decides, every tick, which attacks connect.
//!
//! # Quick Start
//!
//! ```
//! use fray_engine::prelude::*;
//!
//! let defs = vec![FighterDef::default(), FighterDef::default()];
//! let mut sim = Simulation::new(SimulationConfig::default(), FlatStage::default(), defs).unwrap();
//!
//! sim.set_sample(0, InputSample { attack: true, ..Default::default() }).unwrap();
//! let report = sim.tick().unwrap();
//!
//! assert_eq!(sim.fighter(0).unwrap().state, StateKind::Action);
//! assert!(report.has_event(|e| matches!(e, GameEvent::ActionStarted { .. })));
//! ```

#![deny(unsafe_code)]

pub mod action;
pub mod collision;
pub mod config;
pub mod events;
pub mod fighter;
pub mod hit;
pub mod physics;
pub mod replay;
pub mod snapshot;
pub mod stage;
pub mod state;
pub mod tick;

use fray_core::action::ActionKind;
use fray_core::{CoreError, FighterIndex};
use fray_defs::DefsError;
use fray_script::ScriptError;

/// Re-export the core crate for convenience.
pub use fray_core;

/// Re-export the definitions crate for convenience.
pub use fray_defs;

/// Re-export the script crate for convenience.
pub use fray_script;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while building or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// An action script failed outside editor mode. The match cannot go on.
    #[error("fighter {fighter} action {action}: script error at {message}")]
    ScriptFailure {
        fighter: FighterIndex,
        action: ActionKind,
        message: String,
    },

    #[error(transparent)]
    Defs(#[from] DefsError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Input(#[from] CoreError),

    #[error("no fighter with index {0}")]
    UnknownFighter(FighterIndex),

    #[error("fighter {fighter} has no script for {action}")]
    UnknownAction {
        fighter: FighterIndex,
        action: ActionKind,
    },

    /// A match needs between one and four fighters.
    #[error("a match needs 1 to 4 fighters, got {0}")]
    FighterCount(usize),

    #[error("state registry is missing {0:?}")]
    IncompleteRegistry(Vec<state::StateKind>),

    /// A [`SimulationConfig`](config::SimulationConfig) setting is out of range.
    #[error("invalid config `{field}`: {reason}")]
    Config { field: &'static str, reason: String },

    /// A snapshot does not fit the simulation it is restored into.
    #[error("snapshot mismatch: {0}")]
    Snapshot(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use fray_core::prelude::*;
    pub use fray_defs::prelude::*;
    pub use fray_script::{ScriptConfig, ScriptRuntime, TimelineRuntime};

    pub use crate::action::{Action, ActionTick};
    pub use crate::collision::{
        Body, CollisionOutcome, CollisionResolver, GrabRecord, HitBits, HitRecord,
    };
    pub use crate::config::SimulationConfig;
    pub use crate::events::{GameEvent, TickReport};
    pub use crate::fighter::{Fighter, Pose, Variables};
    pub use crate::hit::{Block, Knockback};
    pub use crate::replay::{
        replay, ReplayDivergence, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult,
    };
    pub use crate::snapshot::SimSnapshot;
    pub use crate::stage::{Diamond, FlatStage, LedgeClaims, LedgeId, MoveAttempt, Stage};
    pub use crate::state::{FighterState, StateKind, StateRegistry, Step, Transition};
    pub use crate::tick::{Simulation, TickDiagnostics, TickInput};
    pub use crate::SimError;
}
