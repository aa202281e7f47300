//! Hitstop, hitstun, tumble and prone.

use fray_core::action::ActionKind;
use fray_core::command::Command;

use super::air::air_table;
use super::{
    anim, FighterState, Footing, Motion, StateEnv, StateKind, StateRegistry, Step, Transition,
};
use crate::fighter::{Fighter, FrozenState};
use crate::physics::Contact;

pub(super) fn register(registry: &mut StateRegistry) {
    registry.register(Box::new(Freeze));
    registry.register(Box::new(HitStun));
    registry.register(Box::new(TumbleStun));
    registry.register(Box::new(Prone));
}

/// Stunned fighters keep their momentum and never fall off by themselves.
const STUNNED: Motion = Motion {
    footing: Footing::Air,
    drive: None,
    edge_stop: super::EdgeStop::Never,
    vertigo: false,
};

// ---------------------------------------------------------------------------
// Freeze
// ---------------------------------------------------------------------------

/// Hitstop for both sides of a hit.
#[derive(Debug)]
struct Freeze;

impl FighterState for Freeze {
    fn kind(&self) -> StateKind {
        StateKind::Freeze
    }

    fn motion(&self) -> Motion {
        Motion::FIXED
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        f.vars.freeze_time = f.vars.freeze_time.saturating_sub(1);
        if f.vars.freeze_time > 0 {
            return None;
        }
        let resume = f.frozen.take().unwrap_or(FrozenState {
            state: StateKind::Neutral,
            progress: 0,
        });
        Some(Step::Resume(resume))
    }
}

// ---------------------------------------------------------------------------
// HitStun
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct HitStun;

impl FighterState for HitStun {
    fn kind(&self) -> StateKind {
        StateKind::HitStun
    }

    fn motion(&self) -> Motion {
        STUNNED
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        if f.vars.hitstun > 0 {
            f.vars.hitstun -= 1;
            return None;
        }
        Some(if f.vars.on_ground {
            Step::To(Transition::to(StateKind::Neutral).play(2, anim::NEUTRAL_LOOP))
        } else {
            Step::To(Transition::to(StateKind::Jumping).play(2, anim::FALLING_LOOP))
        })
    }

    fn on_contact(&self, f: &mut Fighter, contact: &Contact) -> Option<Step> {
        (contact.landed && f.vars.hitstun == 0).then_some(Step::Start(ActionKind::LandLight))
    }
}

// ---------------------------------------------------------------------------
// TumbleStun
// ---------------------------------------------------------------------------

/// Launched hard enough to tumble. Control returns in the air once hitstun
/// runs out, but touching the ground always ends in a tumble landing.
#[derive(Debug)]
struct TumbleStun;

impl FighterState for TumbleStun {
    fn kind(&self) -> StateKind {
        StateKind::TumbleStun
    }

    fn motion(&self) -> Motion {
        STUNNED
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        if f.vars.hitstun > 0 {
            f.vars.hitstun -= 1;
            return None;
        }
        if f.vars.on_ground {
            return Some(Step::Start(ActionKind::LandTumble));
        }
        air_table(f)
    }

    fn on_contact(&self, _f: &mut Fighter, contact: &Contact) -> Option<Step> {
        contact.landed.then_some(Step::Start(ActionKind::LandTumble))
    }
}

// ---------------------------------------------------------------------------
// Prone
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Prone;

impl FighterState for Prone {
    fn kind(&self) -> StateKind {
        StateKind::Prone
    }

    fn motion(&self) -> Motion {
        Motion::GROUND
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        let facing = f.vars.facing;
        let commands = &mut f.commands;
        let kind = if commands.consume_oldest_matching(&Command::ANY_ATTACK).is_some() {
            ActionKind::ProneAttack
        } else if commands.consume_facing(facing, Command::MashLeft, Command::MashRight) {
            ActionKind::ProneForward
        } else if commands.consume_facing(facing, Command::MashRight, Command::MashLeft) {
            ActionKind::ProneBack
        } else if commands
            .consume_oldest_matching(&[Command::MashUp, Command::Jump])
            .is_some()
        {
            ActionKind::ProneStand
        } else {
            return None;
        };
        Some(Step::Start(kind))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fighter::Pose;
    use crate::stage::{FlatStage, LedgeClaims};
    use fray_core::attributes::Attributes;

    fn fighter() -> Fighter {
        Fighter::new(0, "test", Attributes::default(), Pose::new(0.0, 0.0, 1), 8)
    }

    fn update(state: &dyn FighterState, f: &mut Fighter) -> Option<Step> {
        let stage = FlatStage::default();
        let mut ledges = LedgeClaims::default();
        let mut env = StateEnv {
            stage: &stage,
            ledges: &mut ledges,
        };
        state.on_update(f, &mut env)
    }

    #[test]
    fn freeze_counts_down_then_resumes() {
        let mut f = fighter();
        let frozen = FrozenState {
            state: StateKind::HitStun,
            progress: 0,
        };
        f.frozen = Some(frozen);
        f.vars.freeze_time = 3;
        assert_eq!(update(&Freeze, &mut f), None);
        assert_eq!(update(&Freeze, &mut f), None);
        assert_eq!(update(&Freeze, &mut f), Some(Step::Resume(frozen)));
        assert!(f.frozen.is_none());
    }

    #[test]
    fn hitstun_runs_out_into_fall() {
        let mut f = fighter();
        f.vars.on_ground = false;
        f.vars.hitstun = 1;
        assert_eq!(update(&HitStun, &mut f), None);
        let step = update(&HitStun, &mut f);
        assert!(matches!(step, Some(Step::To(t)) if t.state == StateKind::Jumping));
    }

    #[test]
    fn tumble_on_ground_lands_tumbling() {
        let mut f = fighter();
        f.vars.hitstun = 0;
        assert_eq!(
            update(&TumbleStun, &mut f),
            Some(Step::Start(ActionKind::LandTumble))
        );
    }

    #[test]
    fn tumble_in_air_regains_control() {
        let mut f = fighter();
        f.vars.on_ground = false;
        f.commands.push_frame(vec![Command::AttackUp]);
        assert_eq!(
            update(&TumbleStun, &mut f),
            Some(Step::Start(ActionKind::AirUp))
        );
    }

    #[test]
    fn prone_options() {
        let mut f = fighter();
        f.commands.push_frame(vec![Command::MashLeft]);
        assert_eq!(
            update(&Prone, &mut f),
            Some(Step::Start(ActionKind::ProneBack))
        );
        f.commands.push_frame(vec![Command::Jump]);
        assert_eq!(
            update(&Prone, &mut f),
            Some(Step::Start(ActionKind::ProneStand))
        );
        assert_eq!(update(&Prone, &mut f), None);
    }
}
