//! The per-fighter state machine.
//!
//! Every state implements [`FighterState`] and is registered by
//! [`StateKind`] in a [`StateRegistry`]. Each tick the driver asks the
//! current state for at most one [`Step`] (a transition, an action to start,
//! a charge release or a return from freeze), integrates physics with the
//! state's [`Motion`], then lets the state react to the terrain contact
//! (falling off a ledge, landing).
//!
//! States never touch other fighters. Anything shared (ledge ownership,
//! the stage) comes in through [`StateEnv`].

mod action;
mod air;
mod grab;
mod ground;
mod ledge;
mod stun;

pub use action::{end_transition, state_for_action};
pub(crate) use grab::let_go;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use fray_core::action::ActionKind;
use serde::{Deserialize, Serialize};

use crate::fighter::{Fighter, FrozenState};
use crate::physics::Contact;
use crate::stage::{LedgeClaims, Stage};

// ---------------------------------------------------------------------------
// StateKind
// ---------------------------------------------------------------------------

/// Every state a fighter can be in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum StateKind {
    Neutral,
    Walking,
    Dashing,
    Brake,
    Crouch,
    Shield,
    /// Recoil after blocking a hit.
    ShieldStun,
    PreJump,
    /// Airborne and in control: jumps, falls, air hops.
    Jumping,
    /// Landing lag; runs one of the `Land*` actions.
    Landing,
    LedgeHang,
    /// Smash attack held before release.
    Charge,
    /// Grounded action.
    Action,
    AirAction,
    /// Hitstop. The state to return to is kept in [`Fighter::frozen`].
    Freeze,
    HitStun,
    TumbleStun,
    Prone,
    /// Holding another fighter in a grab.
    Grabbing,
    /// Held in another fighter's grab.
    Held,
    /// Editor-controlled; no input, no physics.
    EditorPreview,
}

impl StateKind {
    pub const ALL: [StateKind; 21] = [
        StateKind::Neutral,
        StateKind::Walking,
        StateKind::Dashing,
        StateKind::Brake,
        StateKind::Crouch,
        StateKind::Shield,
        StateKind::ShieldStun,
        StateKind::PreJump,
        StateKind::Jumping,
        StateKind::Landing,
        StateKind::LedgeHang,
        StateKind::Charge,
        StateKind::Action,
        StateKind::AirAction,
        StateKind::Freeze,
        StateKind::HitStun,
        StateKind::TumbleStun,
        StateKind::Prone,
        StateKind::Grabbing,
        StateKind::Held,
        StateKind::EditorPreview,
    ];

    /// States that keep the fighter's action alive.
    ///
    /// Transitioning into any other state cancels the current action.
    pub fn holds_action(self) -> bool {
        matches!(
            self,
            StateKind::Charge
                | StateKind::Action
                | StateKind::AirAction
                | StateKind::Landing
                | StateKind::Freeze
        )
    }

    /// Grab volumes can seize a fighter in this state.
    pub fn grabbable(self) -> bool {
        !matches!(
            self,
            StateKind::LedgeHang
                | StateKind::Freeze
                | StateKind::Grabbing
                | StateKind::Held
                | StateKind::EditorPreview
        )
    }

    /// States whose action ticks every frame.
    pub fn runs_action(self) -> bool {
        matches!(
            self,
            StateKind::Action | StateKind::AirAction | StateKind::Landing
        )
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Transition / Step
// ---------------------------------------------------------------------------

/// A state change plus the animation cues that go with it.
///
/// `anim_now` plays immediately with a `fade_now`-frame blend; `anim_after`
/// is queued to play when it finishes. A transition with no animation keeps
/// whatever is playing.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: StateKind,
    pub fade_now: u8,
    pub anim_now: Option<Cow<'static, str>>,
    pub fade_after: u8,
    pub anim_after: Option<Cow<'static, str>>,
}

impl Transition {
    pub fn to(state: StateKind) -> Self {
        Self {
            state,
            fade_now: 0,
            anim_now: None,
            fade_after: 0,
            anim_after: None,
        }
    }

    pub fn play(mut self, fade: u8, anim: &'static str) -> Self {
        self.fade_now = fade;
        self.anim_now = Some(Cow::Borrowed(anim));
        self
    }

    pub fn then(mut self, fade: u8, anim: &'static str) -> Self {
        self.fade_after = fade;
        self.anim_after = Some(Cow::Borrowed(anim));
        self
    }
}

/// What a state decided this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    To(Transition),
    /// Start an action; the next state follows from the action kind.
    Start(ActionKind),
    /// Charge released: enter `Action` and run the pending smash.
    ReleaseCharge,
    /// Freeze over: return to the remembered state and progress.
    Resume(FrozenState),
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// How a state relates to the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Footing {
    /// Falls when the floor disappears.
    Ground,
    /// Lands when a floor is hit.
    Air,
    /// Integrates but never falls or lands by itself.
    Anchored,
    /// No physics at all.
    Fixed,
}

/// Source of input-driven horizontal acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    Walk,
    Dash,
    Air,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStop {
    Never,
    Always,
    /// Stop unless the stick is fully held in the direction of travel.
    UnlessHeld,
}

/// Physics behaviour of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motion {
    pub footing: Footing,
    pub drive: Option<Drive>,
    pub edge_stop: EdgeStop,
    /// Stopping at an edge while facing it plays the vertigo animation.
    pub vertigo: bool,
}

impl Motion {
    pub const GROUND: Motion = Motion {
        footing: Footing::Ground,
        drive: None,
        edge_stop: EdgeStop::Always,
        vertigo: false,
    };

    pub const AIR: Motion = Motion {
        footing: Footing::Air,
        drive: Some(Drive::Air),
        edge_stop: EdgeStop::Never,
        vertigo: false,
    };

    pub const FIXED: Motion = Motion {
        footing: Footing::Fixed,
        drive: None,
        edge_stop: EdgeStop::Never,
        vertigo: false,
    };
}

// ---------------------------------------------------------------------------
// FighterState
// ---------------------------------------------------------------------------

/// Shared, non-fighter data a state may consult.
pub struct StateEnv<'a> {
    pub stage: &'a dyn Stage,
    pub ledges: &'a mut LedgeClaims,
}

/// One state of the fighter state machine.
pub trait FighterState: fmt::Debug + Send + Sync {
    fn kind(&self) -> StateKind;

    fn motion(&self) -> Motion;

    fn on_enter(&self, _fighter: &mut Fighter) {}

    /// Evaluate the transition table. Consumes at most one command.
    fn on_update(&self, fighter: &mut Fighter, env: &mut StateEnv<'_>) -> Option<Step>;

    fn on_exit(&self, _fighter: &mut Fighter) {}

    /// React to this tick's terrain contact.
    ///
    /// By default grounded states fall when the floor disappears.
    fn on_contact(&self, fighter: &mut Fighter, contact: &Contact) -> Option<Step> {
        fall_if_unsupported(self.motion(), fighter, contact)
    }
}

/// Forced transition into the falling state.
pub fn fall(fighter: &mut Fighter) -> Step {
    fighter.vars.extra_jumps = fighter.attributes.extra_jumps;
    Step::To(Transition::to(StateKind::Jumping).play(2, anim::FALLING_LOOP))
}

pub(crate) fn fall_if_unsupported(
    motion: Motion,
    fighter: &mut Fighter,
    contact: &Contact,
) -> Option<Step> {
    (motion.footing == Footing::Ground && contact.left_ground).then(|| fall(fighter))
}

// ---------------------------------------------------------------------------
// EditorPreview
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct EditorPreview;

impl FighterState for EditorPreview {
    fn kind(&self) -> StateKind {
        StateKind::EditorPreview
    }

    fn motion(&self) -> Motion {
        Motion::FIXED
    }

    fn on_update(&self, _fighter: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        None
    }
}

// ---------------------------------------------------------------------------
// StateRegistry
// ---------------------------------------------------------------------------

/// State implementations keyed by kind.
#[derive(Debug, Default)]
pub struct StateRegistry {
    states: BTreeMap<StateKind, Box<dyn FighterState>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in state.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        ground::register(&mut registry);
        air::register(&mut registry);
        action::register(&mut registry);
        ledge::register(&mut registry);
        stun::register(&mut registry);
        grab::register(&mut registry);
        registry.register(Box::new(EditorPreview));
        registry
    }

    /// Add or replace a state, returning the one it replaced.
    pub fn register(&mut self, state: Box<dyn FighterState>) -> Option<Box<dyn FighterState>> {
        self.states.insert(state.kind(), state)
    }

    pub fn get(&self, kind: StateKind) -> Option<&dyn FighterState> {
        self.states.get(&kind).map(|s| s.as_ref())
    }

    /// Kinds with no registered implementation.
    pub fn missing(&self) -> Vec<StateKind> {
        StateKind::ALL
            .into_iter()
            .filter(|k| !self.states.contains_key(k))
            .collect()
    }

    /// Look up a state the registry is known to contain.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is not registered. [`Simulation`](crate::tick::Simulation)
    /// only accepts registries with nothing [`missing`](Self::missing).
    pub(crate) fn state(&self, kind: StateKind) -> &dyn FighterState {
        match self.get(kind) {
            Some(state) => state,
            None => panic!("state {kind} is not registered"),
        }
    }
}

// ---------------------------------------------------------------------------
// Animation names
// ---------------------------------------------------------------------------

/// Animation keys the state machine cues.
pub mod anim {
    use fray_core::attributes::{MIN_HITSTUN_HEAVY, MIN_HITSTUN_TUMBLE};
    use fray_core::volume::Region;

    pub const NEUTRAL_LOOP: &str = "NeutralLoop";
    pub const TURN: &str = "Turn";
    pub const WALKING_LOOP: &str = "WalkingLoop";
    pub const DASH_START: &str = "DashStart";
    pub const DASHING_LOOP: &str = "DashingLoop";
    pub const BRAKE: &str = "Brake";
    pub const TURN_DASH: &str = "TurnDash";
    pub const TURN_BRAKE: &str = "TurnBrake";
    pub const CROUCH_ON: &str = "CrouchOn";
    pub const CROUCH_LOOP: &str = "CrouchLoop";
    pub const CROUCH_OFF: &str = "CrouchOff";
    pub const SHIELD_ON: &str = "ShieldOn";
    pub const SHIELD_LOOP: &str = "ShieldLoop";
    pub const SHIELD_OFF: &str = "ShieldOff";
    pub const PRE_JUMP: &str = "PreJump";
    pub const JUMP_FORWARD: &str = "JumpForward";
    pub const JUMP_BACK: &str = "JumpBack";
    pub const AIR_HOP_FORWARD: &str = "AirHopForward";
    pub const AIR_HOP_BACK: &str = "AirHopBack";
    pub const FALLING_LOOP: &str = "FallingLoop";
    pub const LEDGE_CATCH: &str = "LedgeCatch";
    pub const LEDGE_LOOP: &str = "LedgeLoop";
    pub const LEDGE_JUMP: &str = "LedgeJump";
    pub const VERTIGO_START: &str = "VertigoStart";
    pub const VERTIGO_LOOP: &str = "VertigoLoop";
    pub const TUMBLE_LOOP: &str = "TumbleLoop";
    pub const PRONE_LOOP: &str = "ProneLoop";
    pub const REBOUND: &str = "Rebound";
    pub const GRAB_HOLD: &str = "GrabHold";
    pub const HELD_LOOP: &str = "HeldLoop";

    /// Flinch animation for a hit on `region` causing `hitstun` frames.
    pub fn flinch(region: Region, hitstun: u32) -> &'static str {
        let tier = if hitstun >= MIN_HITSTUN_TUMBLE {
            2
        } else if hitstun >= MIN_HITSTUN_HEAVY {
            1
        } else {
            0
        };
        match (region, tier) {
            (Region::Middle, 0) => "HurtMiddleLight",
            (Region::Middle, 1) => "HurtMiddleHeavy",
            (Region::Middle, _) => "HurtMiddleTumble",
            (Region::Lower, 0) => "HurtLowerLight",
            (Region::Lower, 1) => "HurtLowerHeavy",
            (Region::Lower, _) => "HurtLowerTumble",
            (Region::Upper, 0) => "HurtUpperLight",
            (Region::Upper, 1) => "HurtUpperHeavy",
            (Region::Upper, _) => "HurtUpperTumble",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fray_core::volume::Region;

    #[test]
    fn standard_registry_is_complete() {
        let registry = StateRegistry::standard();
        assert!(registry.missing().is_empty(), "missing {:?}", registry.missing());
        for kind in StateKind::ALL {
            assert_eq!(registry.state(kind).kind(), kind);
        }
    }

    #[test]
    fn register_replaces_by_kind() {
        let mut registry = StateRegistry::new();
        assert!(registry.register(Box::new(EditorPreview)).is_none());
        assert!(registry.register(Box::new(EditorPreview)).is_some());
        assert_eq!(registry.missing().len(), StateKind::ALL.len() - 1);
    }

    #[test]
    #[should_panic(expected = "is not registered")]
    fn unregistered_state_panics() {
        StateRegistry::new().state(StateKind::Neutral);
    }

    #[test]
    fn only_action_states_keep_actions() {
        assert!(StateKind::Charge.holds_action());
        assert!(StateKind::Freeze.holds_action());
        assert!(!StateKind::Charge.runs_action(), "charge defers the script");
        assert!(!StateKind::Jumping.holds_action());
        assert!(!StateKind::Neutral.holds_action());
    }

    #[test]
    fn grabbed_and_hanging_fighters_cannot_be_grabbed() {
        assert!(StateKind::Shield.grabbable());
        assert!(StateKind::Jumping.grabbable());
        assert!(!StateKind::Held.grabbable());
        assert!(!StateKind::Grabbing.grabbable());
        assert!(!StateKind::LedgeHang.grabbable());
    }

    #[test]
    fn flinch_tiers() {
        assert_eq!(anim::flinch(Region::Upper, 5), "HurtUpperLight");
        assert_eq!(anim::flinch(Region::Lower, 20), "HurtLowerHeavy");
        assert_eq!(anim::flinch(Region::Middle, 32), "HurtMiddleTumble");
    }

    #[test]
    fn transition_builder_sets_cues() {
        let t = Transition::to(StateKind::Shield)
            .play(2, anim::SHIELD_ON)
            .then(1, anim::SHIELD_LOOP);
        assert_eq!(t.anim_now.as_deref(), Some("ShieldOn"));
        assert_eq!(t.anim_after.as_deref(), Some("ShieldLoop"));
        assert_eq!((t.fade_now, t.fade_after), (2, 1));
    }
}
