//! Grounded, non-action states.

use fray_core::action::ActionKind;
use fray_core::attributes::JUMP_DELAY;
use fray_core::command::Command;

use super::{
    anim, fall, fall_if_unsupported, Drive, EdgeStop, FighterState, Footing, Motion, StateEnv,
    StateKind, StateRegistry, Step, Transition,
};
use crate::fighter::Fighter;
use crate::physics::Contact;

const BRAKE_ATTACKS: [Command; 5] = [
    Command::AttackDown,
    Command::AttackUp,
    Command::AttackLeft,
    Command::AttackRight,
    Command::AttackNeutral,
];

pub(super) fn register(registry: &mut StateRegistry) {
    registry.register(Box::new(Neutral));
    registry.register(Box::new(Walking));
    registry.register(Box::new(Dashing));
    registry.register(Box::new(Brake));
    registry.register(Box::new(Crouch));
    registry.register(Box::new(Shield));
    registry.register(Box::new(ShieldStun));
    registry.register(Box::new(PreJump));
}

// ---------------------------------------------------------------------------
// Shared table rows
// ---------------------------------------------------------------------------

fn to_neutral(fade: u8) -> Step {
    Step::To(Transition::to(StateKind::Neutral).play(fade, anim::NEUTRAL_LOOP))
}

fn try_shield(f: &mut Fighter) -> Option<Step> {
    f.commands.consume(Command::Shield).then(|| {
        Step::To(
            Transition::to(StateKind::Shield)
                .play(2, anim::SHIELD_ON)
                .then(0, anim::SHIELD_LOOP),
        )
    })
}

fn try_jump(f: &mut Fighter) -> Option<Step> {
    f.commands
        .consume(Command::Jump)
        .then(|| Step::To(Transition::to(StateKind::PreJump).play(1, anim::PRE_JUMP)))
}

fn try_smash(f: &mut Fighter) -> Option<Step> {
    let facing = f.vars.facing;
    let commands = &mut f.commands;
    if commands.consume(Command::SmashDown) {
        Some(Step::Start(ActionKind::SmashDown))
    } else if commands.consume(Command::SmashUp) {
        Some(Step::Start(ActionKind::SmashUp))
    } else if commands.consume_facing(facing, Command::SmashLeft, Command::SmashRight) {
        Some(Step::Start(ActionKind::SmashForward))
    } else {
        None
    }
}

fn try_tilt(f: &mut Fighter) -> Option<Step> {
    let facing = f.vars.facing;
    let commands = &mut f.commands;
    if commands.consume(Command::AttackDown) {
        Some(Step::Start(ActionKind::TiltDown))
    } else if commands.consume(Command::AttackUp) {
        Some(Step::Start(ActionKind::TiltUp))
    } else if commands.consume_facing(facing, Command::AttackLeft, Command::AttackRight) {
        Some(Step::Start(ActionKind::TiltForward))
    } else if commands.consume(Command::AttackNeutral) {
        Some(Step::Start(ActionKind::NeutralFirst))
    } else {
        None
    }
}

/// Turn around on the spot.
fn try_turn(f: &mut Fighter) -> Option<Step> {
    let facing = f.vars.facing;
    if !f
        .commands
        .consume_facing(facing, Command::TurnRight, Command::TurnLeft)
    {
        return None;
    }
    f.vars.facing = -facing;
    Some(Step::To(
        Transition::to(StateKind::Neutral)
            .play(1, anim::TURN)
            .then(0, anim::NEUTRAL_LOOP),
    ))
}

/// Drop through the one-way platform underfoot. The next move ignores
/// platforms, so the fighter falls through it.
fn try_drop(f: &mut Fighter) -> Option<Step> {
    if !f.vars.on_platform || !f.commands.consume(Command::MashDown) {
        return None;
    }
    f.vars.drop_through = true;
    Some(fall(f))
}

fn try_crouch(f: &Fighter) -> Option<Step> {
    (f.input.int_y == -2).then(|| {
        Step::To(
            Transition::to(StateKind::Crouch)
                .play(2, anim::CROUCH_ON)
                .then(0, anim::CROUCH_LOOP),
        )
    })
}

/// The full standing table, also used when an action opens its interrupt
/// window.
pub(super) fn neutral_table(f: &mut Fighter) -> Option<Step> {
    try_shield(f)
        .or_else(|| try_jump(f))
        .or_else(|| try_smash(f))
        .or_else(|| try_tilt(f))
        .or_else(|| try_turn(f))
        .or_else(|| {
            (f.input.norm_x != 0 && f.input.norm_x == f.vars.facing).then(|| {
                Step::To(Transition::to(StateKind::Walking).play(4, anim::WALKING_LOOP))
            })
        })
        .or_else(|| try_drop(f))
        .or_else(|| try_crouch(f))
}

// ---------------------------------------------------------------------------
// Neutral
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Neutral;

impl FighterState for Neutral {
    fn kind(&self) -> StateKind {
        StateKind::Neutral
    }

    fn motion(&self) -> Motion {
        Motion {
            vertigo: true,
            ..Motion::GROUND
        }
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        neutral_table(f)
    }
}

// ---------------------------------------------------------------------------
// Walking
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Walking;

impl FighterState for Walking {
    fn kind(&self) -> StateKind {
        StateKind::Walking
    }

    fn motion(&self) -> Motion {
        Motion {
            footing: Footing::Ground,
            drive: Some(Drive::Walk),
            edge_stop: EdgeStop::UnlessHeld,
            vertigo: true,
        }
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        let facing = f.vars.facing;
        try_shield(f)
            .or_else(|| try_jump(f))
            .or_else(|| try_smash(f))
            .or_else(|| try_tilt(f))
            .or_else(|| {
                f.commands
                    .consume_facing(facing, Command::MashLeft, Command::MashRight)
                    .then(|| Step::To(Transition::to(StateKind::Dashing).play(1, anim::DASH_START)))
            })
            .or_else(|| try_turn(f))
            .or_else(|| (f.input.int_x == 0).then(|| to_neutral(4)))
            .or_else(|| try_crouch(f))
    }

    fn on_contact(&self, f: &mut Fighter, contact: &Contact) -> Option<Step> {
        fall_if_unsupported(self.motion(), f, contact)
            .or_else(|| contact.attempt.collide_wall.then(|| to_neutral(2)))
    }
}

// ---------------------------------------------------------------------------
// Dashing
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Dashing;

impl FighterState for Dashing {
    fn kind(&self) -> StateKind {
        StateKind::Dashing
    }

    fn motion(&self) -> Motion {
        Motion {
            footing: Footing::Ground,
            drive: Some(Drive::Dash),
            edge_stop: EdgeStop::UnlessHeld,
            vertigo: false,
        }
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        let facing = f.vars.facing;
        let starting = f.anim.is(anim::DASH_START);
        try_shield(f)
            .or_else(|| try_jump(f))
            .or_else(|| {
                f.commands
                    .consume_facing(facing, Command::SmashLeft, Command::SmashRight)
                    .then_some(Step::Start(ActionKind::SmashForward))
            })
            .or_else(|| {
                f.commands
                    .consume_oldest_matching(&BRAKE_ATTACKS)
                    .map(|_| Step::Start(ActionKind::DashAttack))
            })
            .or_else(|| {
                if f.input.int_x == facing * 2 {
                    return None;
                }
                Some(if starting {
                    to_neutral(2)
                } else {
                    Step::To(Transition::to(StateKind::Brake).play(2, anim::BRAKE))
                })
            })
            .or_else(|| {
                (starting && f.state_progress >= f.attributes.dash_start_time).then(|| {
                    Step::To(Transition::to(StateKind::Dashing).play(2, anim::DASHING_LOOP))
                })
            })
    }

    fn on_contact(&self, f: &mut Fighter, contact: &Contact) -> Option<Step> {
        fall_if_unsupported(self.motion(), f, contact).or_else(|| {
            contact
                .attempt
                .collide_wall
                .then(|| Step::To(Transition::to(StateKind::Brake).play(2, anim::BRAKE)))
        })
    }
}

// ---------------------------------------------------------------------------
// Brake
// ---------------------------------------------------------------------------

/// Sliding to a stop after a dash, or turning around mid-dash.
#[derive(Debug)]
struct Brake;

impl FighterState for Brake {
    fn kind(&self) -> StateKind {
        StateKind::Brake
    }

    fn motion(&self) -> Motion {
        Motion {
            edge_stop: EdgeStop::UnlessHeld,
            ..Motion::GROUND
        }
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        let facing = f.vars.facing;
        let braking = f.anim.is(anim::BRAKE);
        try_jump(f)
            .or_else(|| try_smash(f))
            .or_else(|| {
                f.commands
                    .consume_oldest_matching(&BRAKE_ATTACKS)
                    .map(|_| Step::Start(ActionKind::DashAttack))
            })
            .or_else(|| {
                if !braking {
                    return None;
                }
                if f.commands
                    .consume_facing(facing, Command::TurnRight, Command::TurnLeft)
                {
                    f.vars.facing = -facing;
                    return Some(Step::To(
                        Transition::to(StateKind::Brake).play(1, anim::TURN_DASH),
                    ));
                }
                (f.state_progress >= f.attributes.dash_brake_time).then(|| to_neutral(2))
            })
            .or_else(|| {
                if braking || f.state_progress < f.attributes.dash_turn_time {
                    return None;
                }
                Some(if f.input.int_x == f.vars.facing * 2 {
                    Step::To(Transition::to(StateKind::Dashing).play(1, anim::DASHING_LOOP))
                } else {
                    Step::To(
                        Transition::to(StateKind::Neutral)
                            .play(1, anim::TURN_BRAKE)
                            .then(2, anim::NEUTRAL_LOOP),
                    )
                })
            })
    }
}

// ---------------------------------------------------------------------------
// Crouch
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Crouch;

impl FighterState for Crouch {
    fn kind(&self) -> StateKind {
        StateKind::Crouch
    }

    fn motion(&self) -> Motion {
        Motion::GROUND
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        try_shield(f)
            .or_else(|| try_jump(f))
            .or_else(|| try_drop(f))
            .or_else(|| {
                f.commands
                    .consume(Command::SmashDown)
                    .then_some(Step::Start(ActionKind::SmashDown))
            })
            .or_else(|| {
                f.commands
                    .consume(Command::AttackDown)
                    .then_some(Step::Start(ActionKind::TiltDown))
            })
            .or_else(|| {
                (f.input.int_y != -2).then(|| {
                    Step::To(
                        Transition::to(StateKind::Neutral)
                            .play(2, anim::CROUCH_OFF)
                            .then(0, anim::NEUTRAL_LOOP),
                    )
                })
            })
    }
}

// ---------------------------------------------------------------------------
// Shield
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Shield;

impl FighterState for Shield {
    fn kind(&self) -> StateKind {
        StateKind::Shield
    }

    fn motion(&self) -> Motion {
        Motion::GROUND
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        let facing = f.vars.facing;
        if let Some(step) = try_jump(f) {
            return Some(step);
        }
        if f.commands.consume_oldest_matching(&Command::ANY_ATTACK).is_some() {
            return Some(Step::Start(ActionKind::Grab));
        }
        if f.commands
            .consume_facing(facing, Command::MashLeft, Command::MashRight)
        {
            // Rolling forward ends facing back the way it came.
            f.vars.facing = -facing;
            return Some(Step::Start(ActionKind::EvadeForward));
        }
        if f.commands
            .consume_facing(facing, Command::MashRight, Command::MashLeft)
        {
            return Some(Step::Start(ActionKind::EvadeBack));
        }
        if f.commands
            .consume_oldest_matching(&[Command::MashDown, Command::MashUp])
            .is_some()
        {
            return Some(Step::Start(ActionKind::Dodge));
        }
        (!f.input.hold_shield).then(|| {
            Step::To(
                Transition::to(StateKind::Neutral)
                    .play(2, anim::SHIELD_OFF)
                    .then(0, anim::NEUTRAL_LOOP),
            )
        })
    }
}

// ---------------------------------------------------------------------------
// ShieldStun
// ---------------------------------------------------------------------------

/// Recoil after blocking. The shield stays up and neither decays nor
/// regenerates.
#[derive(Debug)]
struct ShieldStun;

impl FighterState for ShieldStun {
    fn kind(&self) -> StateKind {
        StateKind::ShieldStun
    }

    fn motion(&self) -> Motion {
        Motion::GROUND
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        if f.vars.shield_stun > 0 {
            f.vars.shield_stun -= 1;
            return None;
        }
        Some(if f.input.hold_shield {
            Step::To(Transition::to(StateKind::Shield).play(0, anim::SHIELD_LOOP))
        } else {
            Step::To(
                Transition::to(StateKind::Neutral)
                    .play(2, anim::SHIELD_OFF)
                    .then(0, anim::NEUTRAL_LOOP),
            )
        })
    }
}

// ---------------------------------------------------------------------------
// PreJump
// ---------------------------------------------------------------------------

/// Jump squat. Releasing jump before take-off turns the jump into a hop.
#[derive(Debug)]
struct PreJump;

impl FighterState for PreJump {
    fn kind(&self) -> StateKind {
        StateKind::PreJump
    }

    fn motion(&self) -> Motion {
        Motion {
            footing: Footing::Anchored,
            ..Motion::GROUND
        }
    }

    fn on_enter(&self, f: &mut Fighter) {
        f.vars.extra_jumps = f.attributes.extra_jumps;
        f.vars.jump_held = true;
    }

    fn on_update(&self, f: &mut Fighter, _env: &mut StateEnv<'_>) -> Option<Step> {
        if !f.input.hold_jump {
            f.vars.jump_held = false;
        }
        if f.state_progress < JUMP_DELAY {
            return None;
        }

        let attributes = &f.attributes;
        let height = if f.vars.jump_held {
            attributes.jump_height
        } else {
            attributes.hop_height
        };
        f.vars.velocity.x = attributes.air_speed * f.input.float_axis.x * 0.5;
        f.vars.velocity.y = attributes.launch_speed_for_height(height);
        f.vars.on_ground = false;

        let anim = if f.input.norm_x == -f.vars.facing {
            anim::JUMP_BACK
        } else {
            anim::JUMP_FORWARD
        };
        Some(Step::To(
            Transition::to(StateKind::Jumping)
                .play(1, anim)
                .then(0, anim::FALLING_LOOP),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
