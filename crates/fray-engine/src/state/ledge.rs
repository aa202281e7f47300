//! Hanging from a ledge.

use fray_core::action::ActionKind;
use fray_core::attributes::LEDGE_HANG_MIN_TIME;
use fray_core::command::Command;
use fray_core::math::Vec2;

use super::{anim, FighterState, Motion, StateEnv, StateKind, StateRegistry, Step, Transition};
use crate::fighter::Fighter;

pub(super) fn register(registry: &mut StateRegistry) {
    registry.register(Box::new(LedgeHang));
}

fn let_go(f: &mut Fighter) -> Step {
    f.vars.extra_jumps = f.attributes.extra_jumps;
    Step::To(Transition::to(StateKind::Jumping).play(2, anim::FALLING_LOOP))
}

/// Push away from the wall so the drop clears the corner.
fn drop_offset(f: &Fighter) -> Vec2 {
    let diamond = f.diamond();
    Vec2::new(
        -f32::from(f.vars.facing) * diamond.half_width,
        -diamond.offset_top * 0.75,
    )
}

/// Holding a ledge. The ledge is released by the driver whenever this
/// state is left.
#[derive(Debug)]
struct LedgeHang;

impl FighterState for LedgeHang {
    fn kind(&self) -> StateKind {
        StateKind::LedgeHang
    }

    fn motion(&self) -> Motion {
        Motion::FIXED
    }

    fn on_update(&self, f: &mut Fighter, env: &mut StateEnv<'_>) -> Option<Step> {
        let held = f
            .vars
            .ledge
            .filter(|id| env.ledges.holder(*id) == Some(f.index))
            .and_then(|id| env.stage.ledge(id));
        let Some(ledge) = held else {
            // Stolen by another fighter.
            f.vars.translate = drop_offset(f);
            return Some(let_go(f));
        };

        let diamond = f.diamond();
        let hang = ledge.hang_position(&diamond);
        f.vars.position = if f.state_progress <= 1 {
            (f.vars.position + hang) * 0.5
        } else {
            hang
        };
        f.vars.velocity = Vec2::ZERO;
        f.vars.on_ground = false;

        if f.state_progress < LEDGE_HANG_MIN_TIME {
            return None;
        }

        let facing = f.vars.facing;
        if f.commands.consume(Command::Jump) {
            let attributes = &f.attributes;
            f.vars.velocity.y = attributes.launch_speed_for_height(attributes.jump_height);
            f.vars.extra_jumps = attributes.extra_jumps;
            return Some(Step::To(
                Transition::to(StateKind::Jumping)
                    .play(1, anim::LEDGE_JUMP)
                    .then(0, anim::FALLING_LOOP),
            ));
        }
        if f.commands.consume(Command::MashUp)
            || f.commands
                .consume_facing(facing, Command::MashLeft, Command::MashRight)
        {
            f.vars.position = ledge.climb_position(&diamond);
            f.vars.on_ground = true;
            return Some(Step::Start(ActionKind::LedgeClimb));
        }
        if f.commands.consume(Command::MashDown)
            || f.commands
                .consume_facing(facing, Command::MashRight, Command::MashLeft)
        {
            f.vars.translate = drop_offset(f);
            return Some(let_go(f));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fighter::Pose;
    use crate::stage::{FlatStage, LedgeClaims, LedgeId, Stage};
    use fray_core::attributes::Attributes;

    fn hanging(ledges: &mut LedgeClaims) -> Fighter {
        let mut f = Fighter::new(0, "test", Attributes::default(), Pose::new(10.4, -2.2, -1), 8);
        f.state = StateKind::LedgeHang;
        f.vars.on_ground = false;
        f.vars.ledge = Some(LedgeId(1));
        ledges.claim(LedgeId(1), 0);
        f
    }

    fn update(f: &mut Fighter, ledges: &mut LedgeClaims) -> Option<Step> {
        let stage = FlatStage::default();
        let mut env = StateEnv {
            stage: &stage,
            ledges,
        };
        LedgeHang.on_update(f, &mut env)
    }

    #[test]
    fn inputs_ignored_until_min_hang_time() {
        let mut ledges = LedgeClaims::default();
        let mut f = hanging(&mut ledges);
        f.state_progress = 1;
        f.commands.push_frame(vec![Command::Jump]);
        assert_eq!(update(&mut f, &mut ledges), None);
        f.state_progress = LEDGE_HANG_MIN_TIME;
        let step = update(&mut f, &mut ledges);
        assert!(matches!(step, Some(Step::To(t)) if t.state == StateKind::Jumping));
        assert!(f.vars.velocity.y > 0.0);
    }

    #[test]
    fn climbing_stands_on_stage() {
        let mut ledges = LedgeClaims::default();
        let mut f = hanging(&mut ledges);
        f.state_progress = LEDGE_HANG_MIN_TIME;
        f.commands.push_frame(vec![Command::MashUp]);
        assert_eq!(
            update(&mut f, &mut ledges),
            Some(Step::Start(ActionKind::LedgeClimb))
        );
        let ledge = FlatStage::default().ledge(LedgeId(1)).unwrap();
        assert_eq!(f.vars.position, ledge.climb_position(&f.diamond()));
        assert!(f.vars.on_ground);
    }

    #[test]
    fn stolen_ledge_drops_holder() {
        let mut ledges = LedgeClaims::default();
        let mut f = hanging(&mut ledges);
        ledges.claim(LedgeId(1), 1);
        let step = update(&mut f, &mut ledges);
        assert!(matches!(step, Some(Step::To(t)) if t.state == StateKind::Jumping));
        assert!(f.vars.translate.x > 0.0, "pushed away from the stage");
    }
}
