//! Offense (hit) and defense (hurt) collision volumes.
//!
//! Definitions ([`HitVolumeDef`], [`HurtVolumeDef`]) are the persisted,
//! bone-relative shapes authored per action or per fighter. The live
//! counterparts ([`HitVolume`], [`HurtVolume`]) carry the owning fighter and a
//! world-space [`Capsule`] recomputed every tick from the owner's pose.
//!
//! The two kinds are separate types stored in separate arenas, so collision
//! code never needs a runtime tag check to know which one it holds.

use serde::{Deserialize, Serialize};

use crate::action::ActionKind;
use crate::math::{Affine3A, Capsule, Vec3};
use crate::FighterIndex;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Special knockback angle modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AngleMode {
    #[default]
    Normal,
    /// Low knockback sends along the ground, high knockback uses 44 degrees.
    Sakurai,
    /// Sends toward the attacker's direction of travel.
    AutoLink,
}

/// How the horizontal knockback direction is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacingMode {
    /// Away from the attacker based on relative positions.
    #[default]
    Relative,
    /// Along the attacker's facing.
    Forward,
    /// Against the attacker's facing.
    Reverse,
}

/// Clang tier: what happens when this volume overlaps another fighter's hit
/// volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClangMode {
    /// Never clangs; passes straight through.
    Ignore,
    /// Clangs and rebounds the owner.
    #[default]
    Ground,
    /// Aerial volume; skips clang with other fighters' attacks.
    Air,
    /// Clangs (gets cancelled) without rebounding the owner.
    Cancel,
}

/// What a hit volume does to the hurt volumes it touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlobKind {
    /// Deals damage and knockback.
    #[default]
    Damage,
    /// Seizes a grabbable victim in front of the owner. Only clangs with
    /// other grabs.
    Grab,
}

/// Sweet-spot quality. Only affects the debug colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flavour {
    Sour,
    #[default]
    Tangy,
    Sweet,
}

/// Body region of a hurt volume, selecting the flinch animation.
///
/// Declaration order is priority order: when one hit volume overlaps several
/// hurt volumes of the same victim, the lowest region wins.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Region {
    #[default]
    Middle,
    Lower,
    Upper,
}

// ---------------------------------------------------------------------------
// HitVolumeDef
// ---------------------------------------------------------------------------

/// Number of distinct hit groups; groups index a `u32` mask.
pub const MAX_GROUPS: u8 = 32;

/// Persisted definition of an offense volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitVolumeDef {
    /// Model space centre (or first end of the capsule).
    pub origin: Vec3,
    /// Optional second end, making the volume a capsule.
    pub origin_b: Option<Vec3>,
    pub radius: f32,
    /// Attack group, `0..32`. One hit per group per victim per window.
    pub group: u8,
    /// Authoring index, shown in the editor.
    pub index: u8,
    pub kind: BlobKind,
    pub damage: f32,
    pub freeze_mult: f32,
    pub freeze_di_mult: f32,
    /// Degrees, 0 = forward, 90 = up.
    pub knock_angle: f32,
    pub knock_base: f32,
    pub knock_scale: f32,
    /// Bone the volume follows; `None` attaches to the model origin.
    pub bone: Option<u8>,
    pub angle_mode: AngleMode,
    pub facing_mode: FacingMode,
    pub clang_mode: ClangMode,
    pub flavour: Flavour,
    /// Knockback ignores the victim's accumulated damage.
    pub ignore_damage: bool,
    /// Knockback ignores the victim's weight.
    pub ignore_weight: bool,
    pub can_hit_ground: bool,
    pub can_hit_air: bool,
    /// Script handler invoked when this volume connects.
    pub handler: Option<String>,
    /// Sound key played when this volume connects.
    pub sound: Option<String>,
}

impl Default for HitVolumeDef {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            origin_b: None,
            radius: 0.0,
            group: 0,
            index: 0,
            kind: BlobKind::Damage,
            damage: 0.0,
            freeze_mult: 1.0,
            freeze_di_mult: 1.0,
            knock_angle: 0.0,
            knock_base: 0.0,
            knock_scale: 0.0,
            bone: None,
            angle_mode: AngleMode::default(),
            facing_mode: FacingMode::default(),
            clang_mode: ClangMode::default(),
            flavour: Flavour::default(),
            ignore_damage: false,
            ignore_weight: false,
            can_hit_ground: true,
            can_hit_air: true,
            handler: None,
            sound: None,
        }
    }
}

// ---------------------------------------------------------------------------
// HurtVolumeDef
// ---------------------------------------------------------------------------

/// Persisted definition of a defense volume (always a capsule).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HurtVolumeDef {
    pub origin_a: Vec3,
    pub origin_b: Vec3,
    pub radius: f32,
    pub bone: Option<u8>,
    pub region: Region,
    /// Starts intangible (e.g. a hat that can't be hit).
    pub intangible: bool,
}

// ---------------------------------------------------------------------------
// Live volumes
// ---------------------------------------------------------------------------

/// Resolve the transform a volume attached to `bone` should use.
///
/// Returns `None` when the bone is requested but the pose doesn't have it
/// this tick; the volume is then skipped.
fn volume_matrix(model: &Affine3A, bones: &[Affine3A], bone: Option<u8>) -> Option<Affine3A> {
    match bone {
        None => Some(*model),
        Some(b) => bones.get(b as usize).map(|m| *model * *m),
    }
}

/// A live offense volume enabled by an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitVolume {
    /// Key of the definition inside the owning action.
    pub key: String,
    pub owner: FighterIndex,
    pub action: ActionKind,
    pub def: HitVolumeDef,
    /// World-space shape, valid after [`update_shape`](Self::update_shape).
    pub shape: Capsule,
    /// Whether `shape` was computed this tick.
    pub posed: bool,
    /// Cancelled by a clang this tick; cannot hit anyone.
    pub cancelled: bool,
}

impl HitVolume {
    pub fn new(key: impl Into<String>, owner: FighterIndex, action: ActionKind, def: HitVolumeDef) -> Self {
        Self {
            key: key.into(),
            owner,
            action,
            def,
            shape: Capsule::default(),
            posed: false,
            cancelled: false,
        }
    }

    /// Recompute the world-space shape from the owner's pose.
    pub fn update_shape(&mut self, model: &Affine3A, bones: &[Affine3A]) {
        self.cancelled = false;
        match volume_matrix(model, bones, self.def.bone) {
            Some(m) => {
                let a = m.transform_point3(self.def.origin);
                let b = self.def.origin_b.map_or(a, |o| m.transform_point3(o));
                self.shape = Capsule {
                    a,
                    b,
                    radius: self.def.radius,
                };
                self.posed = true;
            }
            None => self.posed = false,
        }
    }

    /// RGB colour for debug rendering, by flavour.
    pub fn debug_colour(&self) -> Vec3 {
        match self.def.flavour {
            Flavour::Sour => Vec3::new(0.6, 0.6, 0.0),
            Flavour::Tangy => Vec3::new(0.2, 1.0, 0.0),
            Flavour::Sweet => Vec3::new(1.0, 0.1, 0.1),
        }
    }
}

/// A live defense volume owned by a fighter for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HurtVolume {
    pub key: String,
    pub owner: FighterIndex,
    pub def: HurtVolumeDef,
    pub shape: Capsule,
    pub posed: bool,
    /// Individually disabled volumes are skipped by collision.
    pub intangible: bool,
}

impl HurtVolume {
    pub fn new(key: impl Into<String>, owner: FighterIndex, def: HurtVolumeDef) -> Self {
        let intangible = def.intangible;
        Self {
            key: key.into(),
            owner,
            def,
            shape: Capsule::default(),
            posed: false,
            intangible,
        }
    }

    pub fn update_shape(&mut self, model: &Affine3A, bones: &[Affine3A]) {
        match volume_matrix(model, bones, self.def.bone) {
            Some(m) => {
                self.shape = Capsule {
                    a: m.transform_point3(self.def.origin_a),
                    b: m.transform_point3(self.def.origin_b),
                    radius: self.def.radius,
                };
                self.posed = true;
            }
            None => self.posed = false,
        }
    }

    /// RGB colour for debug rendering, by region.
    pub fn debug_colour(&self) -> Vec3 {
        match self.def.region {
            Region::Lower => Vec3::new(0.8, 0.0, 1.0),
            Region::Middle => Vec3::new(0.4, 0.4, 1.0),
            Region::Upper => Vec3::new(0.0, 0.8, 1.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{model_matrix, Vec2};

    #[test]
    fn region_priority_order() {
        assert!(Region::Middle < Region::Lower);
        assert!(Region::Lower < Region::Upper);
    }

    #[test]
    fn hit_volume_follows_bone() {
        let def = HitVolumeDef {
            origin: Vec3::new(1.0, 0.0, 0.0),
            radius: 0.5,
            bone: Some(1),
            ..Default::default()
        };
        let mut vol = HitVolume::new("hit", 0, ActionKind::NeutralFirst, def);
        let model = model_matrix(Vec2::new(5.0, 0.0), -1);
        let bones = [
            Affine3A::IDENTITY,
            Affine3A::from_translation(Vec3::new(0.0, 2.0, 0.0)),
        ];
        vol.update_shape(&model, &bones);
        assert!(vol.posed);
        assert_eq!(vol.shape.a, Vec3::new(4.0, 2.0, 0.0));
        assert_eq!(vol.shape.a, vol.shape.b, "sphere volume has equal ends");
    }

    #[test]
    fn missing_bone_skips_volume() {
        let def = HurtVolumeDef {
            bone: Some(9),
            radius: 1.0,
            ..Default::default()
        };
        let mut vol = HurtVolume::new("body", 1, def);
        vol.update_shape(&Affine3A::IDENTITY, &[]);
        assert!(!vol.posed);
    }

    #[test]
    fn defaults_can_hit_everywhere() {
        let def = HitVolumeDef::default();
        assert!(def.can_hit_ground && def.can_hit_air);
        assert_eq!(def.freeze_mult, 1.0);
        assert_eq!(def.clang_mode, ClangMode::Ground);
        assert_eq!(def.kind, BlobKind::Damage);
    }

    #[test]
    fn def_parses_with_missing_fields() {
        let json = serde_json::json!({ "radius": 0.3, "damage": 12.0, "group": 2 });
        let def: HitVolumeDef = serde_json::from_value(json).unwrap();
        assert_eq!(def.group, 2);
        assert!(def.can_hit_air);
        assert_eq!(def.bone, None);
    }

    #[test]
    fn grab_kind_parses_by_name() {
        let json = serde_json::json!({ "radius": 0.4, "kind": "Grab" });
        let def: HitVolumeDef = serde_json::from_value(json).unwrap();
        assert_eq!(def.kind, BlobKind::Grab);
    }
}
