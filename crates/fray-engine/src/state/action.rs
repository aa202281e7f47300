//! States that host an action script.

use fray_core::action::{ActionKind, ActionStatus};

use super::air::{air_table, landing};
use super::ground::neutral_table;
use super::{anim, FighterState, Motion, StateEnv, StateKind, StateRegistry, Step, Transition};
use crate::fighter::Fighter;
use crate::physics::Contact;

pub(super) fn register(registry: &mut StateRegistry) {
    registry.register(Box::new(Charge));
    registry.register(Box::new(GroundAction));
    registry.register(Box::new(AirAction));
    registry.register(Box::new(Landing));
}

/// The state an action runs in.
pub fn state_for_action(kind: ActionKind) -> StateKind {
    match kind {
        k if k.is_smash() => StateKind::Charge,
        k if k.is_aerial() => StateKind::AirAction,
        ActionKind::LandLight
        | ActionKind::LandHeavy
        | ActionKind::LandAttack
        | ActionKind::LandTumble => StateKind::Landing,
        _ => StateKind::Action,
    }
}

/// Where a fighter goes once `kind` finishes.
pub fn end_transition(kind: ActionKind) -> Transition {
    match kind {
        ActionKind::TiltDown => Transition::to(StateKind::Crouch).play(2, anim::CROUCH_LOOP),
        ActionKind::LandTumble => Transition::to(StateKind::Prone).play(2, anim::PRONE_LOOP),
        k if k.is_aerial() => Transition::to(StateKind::Jumping).play(2, anim::FALLING_LOOP),
        _ => Transition::to(StateKind::Neutral).play(2, anim::NEUTRAL_LOOP),
    }
}

fn interruptible(f: &Fighter) -> bool {
    f.action_status() == ActionStatus::AllowInterrupt
}

// ---------------------------------------------------------------------------
// Charge
// ---------------------------------------------------------------------------

/// A smash attack held before its script starts.
#[derive(Debug)]
struct Charge;

impl FighterState for Charge {
    fn kind(&self) -> StateKind {
        StateKind::Charge
    }

    fn motion(&self) -> Motion {
        Motion::GROUND
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        (!f.input.hold_attack).then_some(Step::ReleaseCharge)
    }
}

// ---------------------------------------------------------------------------
// GroundAction
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct GroundAction;

impl FighterState for GroundAction {
    fn kind(&self) -> StateKind {
        StateKind::Action
    }

    fn motion(&self) -> Motion {
        Motion::GROUND
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        if interruptible(f) {
            neutral_table(f)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// AirAction
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct AirAction;

impl FighterState for AirAction {
    fn kind(&self) -> StateKind {
        StateKind::AirAction
    }

    fn motion(&self) -> Motion {
        Motion::AIR
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        if interruptible(f) {
            air_table(f)
        } else {
            None
        }
    }

    fn on_contact(&self, f: &mut Fighter, contact: &Contact) -> Option<Step> {
        if !contact.landed {
            return None;
        }
        Some(match f.action.as_ref().map(|a| a.kind) {
            Some(ActionKind::AirDodge) => landing(f, contact),
            _ => Step::Start(ActionKind::LandAttack),
        })
    }
}

// ---------------------------------------------------------------------------
// Landing
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Landing;

impl FighterState for Landing {
    fn kind(&self) -> StateKind {
        StateKind::Landing
    }

    fn motion(&self) -> Motion {
        Motion::GROUND
    }

    fn on_enter(&self, f: &mut Fighter) {
        f.vars.extra_jumps = f.attributes.extra_jumps;
    }

    fn on_update(&self, _f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_map_to_states() {
        assert_eq!(state_for_action(ActionKind::SmashUp), StateKind::Charge);
        assert_eq!(state_for_action(ActionKind::AirDodge), StateKind::AirAction);
        assert_eq!(state_for_action(ActionKind::LandTumble), StateKind::Landing);
        assert_eq!(state_for_action(ActionKind::LedgeClimb), StateKind::Action);
        assert_eq!(state_for_action(ActionKind::DashAttack), StateKind::Action);
    }

    #[test]
    fn finished_actions_return_to_control() {
        assert_eq!(end_transition(ActionKind::TiltDown).state, StateKind::Crouch);
        assert_eq!(end_transition(ActionKind::AirUp).state, StateKind::Jumping);
        assert_eq!(end_transition(ActionKind::LandTumble).state, StateKind::Prone);
        assert_eq!(end_transition(ActionKind::ProneStand).state, StateKind::Neutral);
        assert_eq!(end_transition(ActionKind::SmashForward).state, StateKind::Neutral);
    }

    #[test]
    fn every_end_state_holds_no_action() {
        for kind in ActionKind::ALL {
            assert!(!end_transition(kind).state.holds_action(), "{kind}");
        }
    }
}
