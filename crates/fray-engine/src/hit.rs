//! Knockback and hitstop.
//!
//! Knockback grows with the victim's accumulated damage and shrinks with
//! weight:
//!
//! ```text
//! damage_factor = d / 10 + d * h / 20        (d = damage after the hit, h = hit damage)
//! weight_factor = 200 / (weight + 100)
//! knockback     = base + (damage_factor * weight_factor * 1.4 + 18) * scale / 100
//! ```
//!
//! Launch speed is `knockback * 0.003` and hitstun `knockback * 0.4` frames.
//!
//! ```
//! use fray_core::volume::HitVolumeDef;
//! use fray_engine::hit::{knockback_amount, freeze_time};
//!
//! let def = HitVolumeDef { damage: 10.0, knock_base: 5.0, knock_scale: 100.0, ..Default::default() };
//! let kb = knockback_amount(&def, 10.0, 100.0);
//! assert!((kb - 5.0 - (6.0 * 1.4 + 18.0)).abs() < 1e-4);
//! assert_eq!(freeze_time(&def), 8);
//! ```

use fray_core::attributes::{GRAB_HOLD_BASE, MIN_HITSTUN_TUMBLE};
use fray_core::math::Vec2;
use fray_core::volume::{AngleMode, FacingMode, HitVolumeDef};
use serde::{Deserialize, Serialize};

use crate::fighter::{Fighter, FrozenState, Pose};
use crate::state::StateKind;

/// Sakurai-angle knockback below this stays along the ground.
const SAKURAI_LOW_KNOCKBACK: f32 = 32.0;
const SAKURAI_HIGH_ANGLE: f32 = 44.0;

/// Shield pushback speed per point of blocked damage.
const SHIELD_PUSHBACK: f32 = 0.004;

/// Result of a hit on its victim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knockback {
    pub knockback: f32,
    pub launch_speed: f32,
    pub direction: Vec2,
    pub hitstun: u32,
    /// Hitstop applied to both sides.
    pub freeze: u32,
}

impl Knockback {
    pub fn tumbles(&self) -> bool {
        self.hitstun >= MIN_HITSTUN_TUMBLE
    }
}

/// Knockback for `def` landing on a victim at `damage` percent (after the
/// hit) and `weight`.
pub fn knockback_amount(def: &HitVolumeDef, damage: f32, weight: f32) -> f32 {
    let d = if def.ignore_damage { 0.0 } else { damage };
    let damage_factor = d / 10.0 + d * def.damage / 20.0;
    let weight_factor = if def.ignore_weight {
        1.0
    } else {
        200.0 / (weight + 100.0)
    };
    def.knock_base + (damage_factor * weight_factor * 1.4 + 18.0) * def.knock_scale * 0.01
}

pub fn freeze_time(def: &HitVolumeDef) -> u32 {
    ((def.damage * 0.4 + 4.0) * def.freeze_mult) as u32
}

/// Ticks a grab holds a victim at `damage` percent before it breaks free.
pub fn grab_hold_time(damage: f32) -> u32 {
    GRAB_HOLD_BASE + (damage * 0.5) as u32
}

/// Ticks of shield stun after blocking `damage`.
pub fn shield_stun(damage: f32) -> u32 {
    (damage * 0.8 + 2.0) as u32
}

/// Result of a hit absorbed by a shield.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Hitstop applied to both sides.
    pub freeze: u32,
    pub stun: u32,
    /// Shield health left.
    pub shield: f32,
}

/// Hitstop for an attacker rebounding off a clang with `damage`.
pub fn rebound_stun(damage: f32) -> u32 {
    (damage * 0.4 + 4.0) as u32
}

/// Unit launch direction and the horizontal sign it was chosen with.
pub fn knock_direction(
    def: &HitVolumeDef,
    knockback: f32,
    attacker: Pose,
    attacker_velocity: Vec2,
    victim: Pose,
    victim_grounded: bool,
) -> (Vec2, i8) {
    let sign = match def.facing_mode {
        FacingMode::Relative if victim.position.x > attacker.position.x => 1,
        FacingMode::Relative if victim.position.x < attacker.position.x => -1,
        FacingMode::Relative | FacingMode::Forward => attacker.facing,
        FacingMode::Reverse => -attacker.facing,
    };

    if def.angle_mode == AngleMode::AutoLink {
        let along = attacker_velocity.normalize_or_zero();
        if along != Vec2::ZERO {
            let sign = if along.x < 0.0 { -1 } else { 1 };
            return (along, sign);
        }
    }

    let degrees = match def.angle_mode {
        AngleMode::Sakurai if victim_grounded && knockback < SAKURAI_LOW_KNOCKBACK => 0.0,
        AngleMode::Sakurai => SAKURAI_HIGH_ANGLE,
        _ => def.knock_angle,
    };
    let radians = degrees.to_radians();
    let direction = Vec2::new(radians.cos() * f32::from(sign), radians.sin());
    (direction, sign)
}

impl Fighter {
    /// The shield is up, including the recoil and hitstop of a block.
    pub fn shielding(&self) -> bool {
        match self.state {
            StateKind::Shield | StateKind::ShieldStun => true,
            StateKind::Freeze => self
                .frozen
                .is_some_and(|frozen| frozen.state == StateKind::ShieldStun),
            _ => false,
        }
    }

    /// Absorb a hit with the shield. Damage goes to shield health only.
    ///
    /// Returns `None` when the shield breaks; the hit must then be applied
    /// with [`take_hit`](Self::take_hit).
    pub(crate) fn block(&mut self, def: &HitVolumeDef, attacker: Pose) -> Option<Block> {
        self.vars.shield -= def.damage;
        if self.vars.shield <= 0.0 {
            self.vars.shield = 0.0;
            return None;
        }
        let away = match self.vars.position.x.total_cmp(&attacker.position.x) {
            std::cmp::Ordering::Less => -1.0,
            std::cmp::Ordering::Greater => 1.0,
            std::cmp::Ordering::Equal => f32::from(attacker.facing),
        };
        let result = Block {
            freeze: freeze_time(def),
            stun: shield_stun(def.damage),
            shield: self.vars.shield,
        };
        self.vars.velocity = Vec2::new(away * def.damage * SHIELD_PUSHBACK, 0.0);
        self.vars.shield_stun = result.stun;
        self.vars.freeze_time = result.freeze;
        self.frozen = Some(FrozenState {
            state: StateKind::ShieldStun,
            progress: 0,
        });
        Some(result)
    }

    /// Apply a connecting hit. The victim is left frozen, then resumes into
    /// hitstun or tumble.
    pub(crate) fn take_hit(
        &mut self,
        def: &HitVolumeDef,
        attacker: Pose,
        attacker_velocity: Vec2,
    ) -> Knockback {
        self.vars.damage += def.damage;
        let knockback = knockback_amount(def, self.vars.damage, self.attributes.weight);
        let (direction, sign) = knock_direction(
            def,
            knockback,
            attacker,
            attacker_velocity,
            self.pose(),
            self.vars.on_ground,
        );

        let result = Knockback {
            knockback,
            launch_speed: knockback * 0.003,
            direction,
            hitstun: (knockback * 0.4) as u32,
            freeze: freeze_time(def),
        };

        let vars = &mut self.vars;
        vars.velocity = direction * result.launch_speed;
        vars.launch_speed = result.launch_speed;
        vars.hitstun = result.hitstun;
        vars.freeze_time = result.freeze;
        vars.facing = -sign;
        self.frozen = Some(FrozenState {
            state: if result.tumbles() {
                StateKind::TumbleStun
            } else {
                StateKind::HitStun
            },
            progress: 0,
        });
        result
    }

    /// Hitstop for landing a hit. Returns whether the fighter must enter
    /// [`StateKind::Freeze`]; one already frozen only extends its timer.
    pub(crate) fn freeze_for_attack(&mut self, freeze: u32) -> bool {
        if self.state == StateKind::Freeze {
            self.vars.freeze_time = self.vars.freeze_time.max(freeze);
            return false;
        }
        if freeze == 0 {
            return false;
        }
        self.frozen = Some(FrozenState {
            state: self.state,
            progress: self.state_progress,
        });
        self.vars.freeze_time = freeze;
        true
    }

    /// Hitstop after a rebound, ending in neutral.
    pub(crate) fn rebound(&mut self, damage: f32) -> u32 {
        let stun = rebound_stun(damage);
        self.vars.freeze_time = stun;
        self.frozen = Some(FrozenState {
            state: StateKind::Neutral,
            progress: 0,
        });
        stun
    }
}
