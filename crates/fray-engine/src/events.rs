//! What happened during a tick, for presentation and tests.
//!
//! Events are collected in the order they occur and returned from
//! [`Simulation::tick`](crate::tick::Simulation::tick). Nothing in the
//! simulation reads them back.

use fray_core::action::{ActionKind, ActionStatus};
use fray_core::volume::Region;
use fray_core::FighterIndex;
use serde::{Deserialize, Serialize};

use crate::state::StateKind;

/// A single observable occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Hit {
        attacker: FighterIndex,
        victim: FighterIndex,
        action: ActionKind,
        /// Key of the hit blob that connected.
        blob: String,
        damage: f32,
        knockback: f32,
        region: Region,
        /// Script handler named by the blob, if any.
        handler: Option<String>,
    },
    Clang {
        first: FighterIndex,
        second: FighterIndex,
    },
    Rebound {
        fighter: FighterIndex,
        stun: u32,
    },
    /// A damage blob landed on a raised shield; `shield` is what is left.
    Blocked {
        attacker: FighterIndex,
        victim: FighterIndex,
        blob: String,
        damage: f32,
        shield: f32,
    },
    /// A hit emptied the shield and went through.
    ShieldBroken {
        fighter: FighterIndex,
    },
    Grabbed {
        grabber: FighterIndex,
        victim: FighterIndex,
        blob: String,
    },
    /// The victim broke free, or either side was pulled out of the grab.
    GrabReleased {
        grabber: FighterIndex,
        victim: FighterIndex,
    },
    StateChanged {
        fighter: FighterIndex,
        from: StateKind,
        to: StateKind,
    },
    ActionStarted {
        fighter: FighterIndex,
        action: ActionKind,
    },
    ActionFinished {
        fighter: FighterIndex,
        action: ActionKind,
        status: ActionStatus,
    },
    /// Touched down; `action` is the landing variant chosen.
    Landed {
        fighter: FighterIndex,
        action: ActionKind,
    },
    PlayEffect {
        fighter: FighterIndex,
        key: String,
    },
    EmitParticles {
        fighter: FighterIndex,
        key: String,
    },
    PlaySound {
        fighter: FighterIndex,
        key: String,
    },
    /// A recoverable script failure (editor mode only).
    ScriptError {
        fighter: FighterIndex,
        action: ActionKind,
        message: String,
    },
    KnockedOut {
        fighter: FighterIndex,
    },
}

/// The outcome of one [`Simulation::tick`](crate::tick::Simulation::tick).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// The tick that just ran (0 for the first).
    pub tick: u64,
    pub events: Vec<GameEvent>,
}

impl TickReport {
    pub fn hits(&self) -> impl Iterator<Item = &GameEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, GameEvent::Hit { .. }))
    }

    pub fn has_event(&self, pred: impl Fn(&GameEvent) -> bool) -> bool {
        self.events.iter().any(pred)
    }
}
