//! Airborne control: jumping, falling, air hops, aerials and ledge catches.

use fray_core::action::ActionKind;
use fray_core::attributes::NO_LEDGE_CATCH_TIME;
use fray_core::command::Command;

use super::{anim, FighterState, Motion, StateEnv, StateKind, StateRegistry, Step, Transition};
use crate::fighter::Fighter;
use crate::physics::Contact;

pub(super) fn register(registry: &mut StateRegistry) {
    registry.register(Box::new(Jumping));
}

fn air_hop(f: &mut Fighter) -> Option<Step> {
    if f.vars.extra_jumps == 0 || !f.commands.consume(Command::Jump) {
        return None;
    }
    let attributes = &f.attributes;
    f.vars.extra_jumps -= 1;
    f.vars.velocity.x = attributes.air_speed * f.input.float_axis.x;
    f.vars.velocity.y = attributes.launch_speed_for_height(attributes.air_hop_height);
    f.vars.launch_speed = 0.0;
    let anim = if f.input.norm_x == -f.vars.facing {
        anim::AIR_HOP_BACK
    } else {
        anim::AIR_HOP_FORWARD
    };
    Some(Step::To(
        Transition::to(StateKind::Jumping)
            .play(1, anim)
            .then(0, anim::FALLING_LOOP),
    ))
}

fn aerial(f: &mut Fighter) -> Option<Step> {
    let facing = f.vars.facing;
    let commands = &mut f.commands;
    let kind = if commands
        .consume_oldest_matching(&[Command::SmashDown, Command::AttackDown])
        .is_some()
    {
        ActionKind::AirDown
    } else if commands
        .consume_oldest_matching(&[Command::SmashUp, Command::AttackUp])
        .is_some()
    {
        ActionKind::AirUp
    } else if commands
        .consume_oldest_facing(
            facing,
            &[Command::SmashLeft, Command::AttackLeft],
            &[Command::SmashRight, Command::AttackRight],
        )
        .is_some()
    {
        ActionKind::AirForward
    } else if commands
        .consume_oldest_facing(
            facing,
            &[Command::SmashRight, Command::AttackRight],
            &[Command::SmashLeft, Command::AttackLeft],
        )
        .is_some()
    {
        ActionKind::AirBack
    } else if commands.consume(Command::AttackNeutral) {
        ActionKind::AirNeutral
    } else {
        return None;
    };
    Some(Step::Start(kind))
}

/// Everything an airborne fighter in control may do.
pub(super) fn air_table(f: &mut Fighter) -> Option<Step> {
    if f.commands.consume(Command::Shield) {
        return Some(Step::Start(ActionKind::AirDodge));
    }
    air_hop(f).or_else(|| aerial(f)).or_else(|| {
        if f.vars.velocity.y < 0.0 && !f.vars.fast_fall && f.commands.consume(Command::MashDown) {
            f.vars.fast_fall = true;
        }
        None
    })
}

/// Light landing when falling gently or shortly after leaving the ground.
pub(super) fn landing(f: &Fighter, contact: &Contact) -> Step {
    let gentle = contact.fall_speed > -f.attributes.fall_speed;
    if gentle || f.state_progress < f.attributes.land_heavy_min_time {
        Step::Start(ActionKind::LandLight)
    } else {
        Step::Start(ActionKind::LandHeavy)
    }
}

fn catch_ledge(f: &mut Fighter, env: &mut StateEnv<'_>) -> Option<Step> {
    if f.vars.time_since_ledge <= NO_LEDGE_CATCH_TIME || f.vars.velocity.y > 0.0 {
        return None;
    }
    let diamond = f.diamond();
    let id = env
        .stage
        .find_ledge(&diamond, f.vars.position, f.input.norm_x)?;
    let ledge = env.stage.ledge(id)?;
    env.ledges.claim(id, f.index);
    f.vars.ledge = Some(id);
    f.vars.facing = -ledge.direction;
    f.vars.velocity = fray_core::math::Vec2::ZERO;
    f.vars.launch_speed = 0.0;
    f.vars.fast_fall = false;
    Some(Step::To(
        Transition::to(StateKind::LedgeHang)
            .play(1, anim::LEDGE_CATCH)
            .then(0, anim::LEDGE_LOOP),
    ))
}

// ---------------------------------------------------------------------------
// Jumping
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Jumping;

impl FighterState for Jumping {
    fn kind(&self) -> StateKind {
        StateKind::Jumping
    }

    fn motion(&self) -> Motion {
        Motion::AIR
    }

    fn on_update(&self, f: &mut Fighter, env: &mut StateEnv<'_>) -> Option<Step> {
        catch_ledge(f, env).or_else(|| air_table(f))
    }

    fn on_contact(&self, f: &mut Fighter, contact: &Contact) -> Option<Step> {
        contact.landed.then(|| landing(f, contact))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fighter::Pose;
    use crate::stage::{Diamond, FlatStage, LedgeClaims, LedgeId, Stage};
    use fray_core::attributes::Attributes;
    use fray_core::math::Vec2;

    fn airborne() -> Fighter {
        let mut f = Fighter::new(0, "test", Attributes::default(), Pose::new(0.0, 3.0, 1), 8);
        f.vars.on_ground = false;
        f.state = StateKind::Jumping;
        f
    }

    fn update(f: &mut Fighter, stage: &FlatStage, ledges: &mut LedgeClaims) -> Option<Step> {
        let mut env = StateEnv { stage, ledges };
        Jumping.on_update(f, &mut env)
    }

    #[test]
    fn air_hop_spends_a_jump() {
        let stage = FlatStage::default();
        let mut ledges = LedgeClaims::default();
        let mut f = airborne();
        f.vars.extra_jumps = 1;
        f.commands.push_frame(vec![Command::Jump]);
        assert!(matches!(update(&mut f, &stage, &mut ledges), Some(Step::To(_))));
        assert_eq!(f.vars.extra_jumps, 0);
        assert!(f.vars.velocity.y > 0.0);

        f.commands.push_frame(vec![Command::Jump]);
        assert_eq!(update(&mut f, &stage, &mut ledges), None);
        assert!(f.commands.contains(Command::Jump), "kept for later");
    }

    #[test]
    fn air_hop_keeps_fast_fall() {
        let stage = FlatStage::default();
        let mut ledges = LedgeClaims::default();
        let mut f = airborne();
        f.vars.fast_fall = true;
        f.vars.extra_jumps = 1;
        f.commands.push_frame(vec![Command::Jump]);
        assert!(matches!(update(&mut f, &stage, &mut ledges), Some(Step::To(_))));
        assert!(!f.vars.on_ground);
        assert!(f.vars.fast_fall, "only landing clears fast fall");
    }

    #[test]
    fn backward_attack_is_back_air() {
        let stage = FlatStage::default();
        let mut ledges = LedgeClaims::default();
        let mut f = airborne();
        f.vars.facing = -1;
        f.commands.push_frame(vec![Command::AttackRight]);
        assert_eq!(
            update(&mut f, &stage, &mut ledges),
            Some(Step::Start(ActionKind::AirBack))
        );
    }

    #[test]
    fn shield_in_air_is_air_dodge() {
        let stage = FlatStage::default();
        let mut ledges = LedgeClaims::default();
        let mut f = airborne();
        f.commands.push_frame(vec![Command::Shield, Command::AttackNeutral]);
        assert_eq!(
            update(&mut f, &stage, &mut ledges),
            Some(Step::Start(ActionKind::AirDodge))
        );
    }

    #[test]
    fn mash_down_while_falling_fast_falls() {
        let stage = FlatStage::default();
        let mut ledges = LedgeClaims::default();
        let mut f = airborne();
        f.vars.velocity.y = -0.05;
        f.commands.push_frame(vec![Command::MashDown]);
        assert_eq!(update(&mut f, &stage, &mut ledges), None);
        assert!(f.vars.fast_fall);
    }

    #[test]
    fn falling_near_ledge_catches_it() {
        let stage = FlatStage::default();
        let mut ledges = LedgeClaims::default();
        let mut f = airborne();
        let diamond = Diamond::from_attributes(&f.attributes);
        let ledge = stage.ledge(LedgeId(1)).unwrap();
        f.vars.position = ledge.hang_position(&diamond) + Vec2::new(0.2, 0.2);
        f.vars.velocity.y = -0.1;
        f.vars.fast_fall = true;
        let step = update(&mut f, &stage, &mut ledges);
        assert!(matches!(step, Some(Step::To(ref t)) if t.state == StateKind::LedgeHang));
        assert_eq!(ledges.holder(LedgeId(1)), Some(0));
        assert_eq!(f.vars.facing, -1);
        assert!(!f.vars.fast_fall, "hanging resets fast fall");
    }

    #[test]
    fn recent_ledge_release_blocks_catch() {
        let stage = FlatStage::default();
        let mut ledges = LedgeClaims::default();
        let mut f = airborne();
        let diamond = Diamond::from_attributes(&f.attributes);
        let ledge = stage.ledge(LedgeId(1)).unwrap();
        f.vars.position = ledge.hang_position(&diamond);
        f.vars.velocity.y = -0.1;
        f.vars.time_since_ledge = 3;
        assert_eq!(update(&mut f, &stage, &mut ledges), None);
    }

    #[test]
    fn hard_fall_lands_heavy() {
        let mut f = airborne();
        f.state_progress = 40;
        let hard = Contact {
            landed: true,
            fall_speed: -f.attributes.fall_speed,
            ..Default::default()
        };
        assert_eq!(landing(&f, &hard), Step::Start(ActionKind::LandHeavy));
        let soft = Contact {
            fall_speed: -0.01,
            ..hard
        };
        assert_eq!(landing(&f, &soft), Step::Start(ActionKind::LandLight));
    }
}
