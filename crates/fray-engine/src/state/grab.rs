//! Both sides of a grab.
//!
//! The link between grabber and victim lives in the driver; these states
//! only hold still, and the victim counts down towards breaking free.

use fray_core::command::Command;

use super::{anim, FighterState, Motion, StateEnv, StateKind, StateRegistry, Step, Transition};
use crate::fighter::Fighter;

/// Ticks taken off the hold for each mash.
const GRAB_MASH_FRAMES: u32 = 4;

const MASHES: [Command; 5] = [
    Command::MashLeft,
    Command::MashRight,
    Command::MashUp,
    Command::MashDown,
    Command::Jump,
];

pub(super) fn register(registry: &mut StateRegistry) {
    registry.register(Box::new(Grabbing));
    registry.register(Box::new(Held));
}

/// Where a fighter goes when its grab ends.
pub(crate) fn let_go(f: &mut Fighter) -> Transition {
    if f.vars.on_ground {
        Transition::to(StateKind::Neutral).play(2, anim::NEUTRAL_LOOP)
    } else {
        f.vars.extra_jumps = f.attributes.extra_jumps;
        Transition::to(StateKind::Jumping).play(2, anim::FALLING_LOOP)
    }
}

// ---------------------------------------------------------------------------
// Grabbing
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Grabbing;

impl FighterState for Grabbing {
    fn kind(&self) -> StateKind {
        StateKind::Grabbing
    }

    fn motion(&self) -> Motion {
        Motion::FIXED
    }

    fn on_update(&self, _f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        None
    }
}

// ---------------------------------------------------------------------------
// Held
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Held;

impl FighterState for Held {
    fn kind(&self) -> StateKind {
        StateKind::Held
    }

    fn motion(&self) -> Motion {
        Motion::FIXED
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        let mashed = f.commands.consume_oldest_matching(&MASHES).is_some();
        let cost = if mashed { 1 + GRAB_MASH_FRAMES } else { 1 };
        f.vars.grab_time = f.vars.grab_time.saturating_sub(cost);
        (f.vars.grab_time == 0).then(|| Step::To(let_go(f)))
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

    fn update(state: &dyn FighterState, f: &mut Fighter) -> Option<Step> {
        let stage = FlatStage::default();
        let mut ledges = LedgeClaims::default();
        let mut env = StateEnv {
            stage: &stage,
            ledges: &mut ledges,
        };
        state.on_update(f, &mut env)
    }

    fn held(grab_time: u32) -> Fighter {
        let mut f = Fighter::new(1, "held", Attributes::default(), Pose::new(0.0, 0.0, -1), 8);
        f.vars.held_by = Some(0);
        f.vars.grab_time = grab_time;
        f
    }

    #[test]
    fn held_fighter_breaks_free_when_time_runs_out() {
        let mut f = held(3);
        assert_eq!(update(&Held, &mut f), None);
        assert_eq!(update(&Held, &mut f), None);
        let step = update(&Held, &mut f);
        assert!(matches!(step, Some(Step::To(t)) if t.state == StateKind::Neutral));
    }

    #[test]
    fn mashing_shortens_the_hold() {
        let mut f = held(10);
        f.commands.push_frame(vec![Command::MashLeft]);
        assert_eq!(update(&Held, &mut f), None);
        assert_eq!(f.vars.grab_time, 10 - 1 - GRAB_MASH_FRAMES);
        assert!(!f.commands.contains(Command::MashLeft), "consumed");
    }

    #[test]
    fn airborne_release_falls_with_jumps_restored() {
        let mut f = held(1);
        f.vars.on_ground = false;
        f.vars.extra_jumps = 0;
        let step = update(&Held, &mut f);
        assert!(matches!(step, Some(Step::To(t)) if t.state == StateKind::Jumping));
        assert_eq!(f.vars.extra_jumps, f.attributes.extra_jumps);
    }

    #[test]
    fn grabber_waits_on_the_driver() {
        let mut f = Fighter::new(0, "grabber", Attributes::default(), Pose::new(0.0, 0.0, 1), 8);
        f.commands.push_frame(vec![Command::AttackNeutral]);
        assert_eq!(update(&Grabbing, &mut f), None);
        assert!(f.commands.contains(Command::AttackNeutral));
    }
}
