//! Per-tick motion integration.
//!
//! Order within a tick: knockback decay, friction, input drive, gravity,
//! then a single terrain move. The pieces are plain functions so they can be
//! tested on their own; [`integrate`] strings them together for a fighter.
//!
//! ```
//! use fray_core::math::Vec2;
//! use fray_engine::physics::decay_launch;
//!
//! let (velocity, remaining) = decay_launch(Vec2::new(0.3, 0.4), 0.5, 0.1);
//! assert!((velocity.length() - 0.4).abs() < 1e-6);
//! assert!((remaining - 0.4).abs() < 1e-6);
//! ```

use fray_core::attributes::Attributes;
use fray_core::input::InputFrame;
use fray_core::math::{approach, Vec2};

use crate::fighter::Fighter;
use crate::stage::{MoveAttempt, Stage};
use crate::state::{Drive, EdgeStop, Footing, Motion};

/// What the terrain did to a fighter this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Contact {
    pub attempt: MoveAttempt,
    /// Airborne at the start of the move, grounded after it.
    pub landed: bool,
    /// Grounded at the start of the move, airborne after it.
    pub left_ground: bool,
    /// Vertical velocity just before touching down.
    pub fall_speed: f32,
}

/// Shrink `velocity` by the launch decay, returning the new velocity and
/// remaining launch speed.
///
/// Only speed gained from knockback decays: the decay applied is capped by
/// the remaining `launch_speed`.
pub fn decay_launch(velocity: Vec2, launch_speed: f32, decay: f32) -> (Vec2, f32) {
    let decay = launch_speed.min(decay).max(0.0);
    let remaining = launch_speed - decay;
    let speed = velocity.length();
    if speed <= decay {
        return (Vec2::ZERO, remaining);
    }
    (velocity * ((speed - decay) / speed), remaining)
}

/// Accelerate `vx` toward `float_x * speed` by `mobility`, only while the
/// stick pushes that way.
pub fn drive(vx: f32, input: &InputFrame, speed: f32, mobility: f32) -> f32 {
    let target = input.float_axis.x * speed;
    if input.int_x < 0 && vx > target {
        (vx - mobility).max(target)
    } else if input.int_x > 0 && vx < target {
        (vx + mobility).min(target)
    } else {
        vx
    }
}

/// Pull `vy` toward the fall speed cap.
///
/// Faster than the cap (a downward launch) recovers at half gravity; slower
/// accelerates at full gravity unless fast-falling, which snaps to the cap.
pub fn apply_gravity(vy: f32, attributes: &Attributes, fast_fall: bool) -> f32 {
    let target = if fast_fall {
        -attributes.fast_fall_speed
    } else {
        -attributes.fall_speed
    };
    if vy < target {
        (vy + attributes.gravity * 0.5).min(target)
    } else if !fast_fall {
        (vy - attributes.gravity).max(target)
    } else {
        target
    }
}

fn edge_stop(mode: EdgeStop, input: &InputFrame, translation: Vec2) -> bool {
    match mode {
        EdgeStop::Never => false,
        EdgeStop::Always => true,
        EdgeStop::UnlessHeld => {
            !((input.int_x == -2 && translation.x < 0.0) || (input.int_x == 2 && translation.x > 0.0))
        }
    }
}

/// Advance `fighter` one tick under `motion` and move it through `stage`.
pub fn integrate(
    fighter: &mut Fighter,
    motion: &Motion,
    stage: &dyn Stage,
    knockback_decay: f32,
) -> Contact {
    let attributes = &fighter.attributes;
    let input = fighter.input;
    let vars = &mut fighter.vars;

    let (velocity, launch) = decay_launch(vars.velocity, vars.launch_speed, knockback_decay);
    vars.velocity = velocity;
    vars.launch_speed = launch;

    let driving = motion.drive.is_some() && input.int_x != 0;
    if vars.on_ground {
        vars.velocity.x = approach(vars.velocity.x, 0.0, attributes.traction);
    } else if vars.launch_speed == 0.0 && !driving {
        vars.velocity.x = approach(vars.velocity.x, 0.0, attributes.air_friction);
    }

    let forward = input.int_x * vars.facing > 0;
    vars.velocity.x = match motion.drive {
        Some(Drive::Walk) if vars.on_ground && forward => drive(
            vars.velocity.x,
            &input,
            attributes.walk_speed,
            attributes.traction * 2.0,
        ),
        Some(Drive::Dash) if vars.on_ground && forward => drive(
            vars.velocity.x,
            &input,
            attributes.dash_speed,
            attributes.traction * 4.0,
        ),
        Some(Drive::Air) if !vars.on_ground => drive(
            vars.velocity.x,
            &input,
            attributes.air_speed,
            attributes.air_mobility,
        ),
        _ => vars.velocity.x,
    };

    vars.velocity.y = apply_gravity(vars.velocity.y, attributes, vars.fast_fall);

    let translation = vars.velocity + vars.translate;
    vars.translate = Vec2::ZERO;
    let stop = vars.on_ground && edge_stop(motion.edge_stop, &input, translation);
    let dropping = std::mem::take(&mut vars.drop_through);
    let ignore_platforms = dropping || (motion.footing == Footing::Air && input.int_y == -2);

    let diamond = crate::stage::Diamond::from_attributes(attributes);
    let attempt = stage.attempt_move(
        &diamond,
        vars.position,
        vars.position + translation,
        stop,
        ignore_platforms,
    );

    let was_on_ground = vars.on_ground;
    let fall_speed = vars.velocity.y;
    vars.position = attempt.result;
    vars.on_platform = attempt.on_platform;
    vars.edge = attempt.edge;

    if attempt.collide_floor && vars.velocity.y <= 0.0 {
        vars.on_ground = true;
        vars.velocity.y = 0.0;
        vars.fast_fall = false;
    } else if !attempt.collide_floor {
        vars.on_ground = false;
    }
    if attempt.collide_ceiling && vars.velocity.y > 0.0 {
        vars.velocity.y = 0.0;
    }
    if attempt.collide_wall {
        vars.velocity.x = 0.0;
    }

    Contact {
        attempt,
        landed: !was_on_ground && vars.on_ground,
        left_ground: was_on_ground && !vars.on_ground,
        fall_speed,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
