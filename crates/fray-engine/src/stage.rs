//! Stage geometry as seen by the fighters.
//!
//! The simulation only talks to terrain through the [`Stage`] trait: it asks
//! the stage to resolve a desired move, to find a grabbable ledge near a
//! falling fighter, and whether a point has left the blast zone. Ledge
//! *ownership* is simulation state and lives in [`LedgeClaims`], so stages
//! stay immutable for the whole match.
//!
//! [`FlatStage`] is the reference implementation: one solid block with a
//! ledge on each top corner, optional one-way platforms and a rectangular
//! blast zone.

use std::collections::BTreeMap;

use fray_core::attributes::Attributes;
use fray_core::math::Vec2;
use fray_core::FighterIndex;
use serde::{Deserialize, Serialize};

/// Tolerance for "standing exactly on a surface".
const SURFACE_EPSILON: f32 = 1e-4;

// ---------------------------------------------------------------------------
// Diamond
// ---------------------------------------------------------------------------

/// The collision outline a fighter presents to the stage.
///
/// Feet sit at the fighter's position; the widest point is `offset_cross`
/// above them and the head a further `offset_top` higher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diamond {
    pub half_width: f32,
    pub offset_cross: f32,
    pub offset_top: f32,
}

impl Diamond {
    pub fn from_attributes(attributes: &Attributes) -> Self {
        Self {
            half_width: attributes.diamond_half_width,
            offset_cross: attributes.diamond_offset_cross,
            offset_top: attributes.diamond_offset_top,
        }
    }

    /// Feet to head.
    pub fn height(&self) -> f32 {
        self.offset_cross + self.offset_top
    }

    /// The widest point of the outline for a fighter standing at `position`.
    pub fn cross_point(&self, position: Vec2) -> Vec2 {
        Vec2::new(position.x, position.y + self.offset_cross)
    }
}

// ---------------------------------------------------------------------------
// MoveAttempt
// ---------------------------------------------------------------------------

/// Result of resolving one desired move against the terrain.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveAttempt {
    /// Where the fighter actually ends up.
    pub result: Vec2,
    pub collide_floor: bool,
    pub collide_wall: bool,
    pub collide_ceiling: bool,
    /// A wall and a floor or ceiling were hit in the same move.
    pub collide_corner: bool,
    /// The floor hit was a one-way platform.
    pub on_platform: bool,
    /// `-1` or `+1` when edge-stop held the fighter at that edge, else `0`.
    pub edge: i8,
}

// ---------------------------------------------------------------------------
// Ledges
// ---------------------------------------------------------------------------

/// Index of a ledge within its stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgeId(pub u16);

/// A grabbable stage corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ledge {
    /// The corner itself.
    pub position: Vec2,
    /// `-1` for a corner on the left side of the stage, `+1` on the right.
    pub direction: i8,
}

impl Ledge {
    /// Where a hanging fighter's feet are: outside the wall, head at the
    /// corner.
    pub fn hang_position(&self, diamond: &Diamond) -> Vec2 {
        Vec2::new(
            self.position.x + f32::from(self.direction) * diamond.half_width,
            self.position.y - diamond.height(),
        )
    }

    /// Where a fighter stands after climbing up.
    pub fn climb_position(&self, diamond: &Diamond) -> Vec2 {
        Vec2::new(
            self.position.x - f32::from(self.direction) * diamond.half_width,
            self.position.y,
        )
    }
}

/// Which fighter currently holds each ledge.
///
/// A fighter catching a ledge that is already held steals it; the previous
/// holder notices on its next update and falls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgeClaims {
    holders: BTreeMap<u16, FighterIndex>,
}

impl LedgeClaims {
    /// Give `ledge` to `fighter`, returning whoever held it before.
    pub fn claim(&mut self, ledge: LedgeId, fighter: FighterIndex) -> Option<FighterIndex> {
        self.holders
            .insert(ledge.0, fighter)
            .filter(|prev| *prev != fighter)
    }

    /// Let go of `ledge` if `fighter` still holds it.
    pub fn release(&mut self, ledge: LedgeId, fighter: FighterIndex) {
        if self.holder(ledge) == Some(fighter) {
            self.holders.remove(&ledge.0);
        }
    }

    pub fn release_all(&mut self, fighter: FighterIndex) {
        self.holders.retain(|_, holder| *holder != fighter);
    }

    pub fn holder(&self, ledge: LedgeId) -> Option<FighterIndex> {
        self.holders.get(&ledge.0).copied()
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Terrain collaborator consulted by the physics integrator.
pub trait Stage {
    /// Resolve a move from `current` toward `target`.
    ///
    /// With `edge_stop`, a fighter standing on a surface is held at its edge
    /// instead of walking off. With `ignore_platforms`, one-way platforms do
    /// not catch a falling fighter.
    fn attempt_move(
        &self,
        diamond: &Diamond,
        current: Vec2,
        target: Vec2,
        edge_stop: bool,
        ignore_platforms: bool,
    ) -> MoveAttempt;

    /// A ledge close enough to catch from `position`. A fighter holding the
    /// stick away from the stage (`input_x` equal to the ledge direction)
    /// never catches it.
    fn find_ledge(&self, diamond: &Diamond, position: Vec2, input_x: i8) -> Option<LedgeId>;

    fn ledge(&self, id: LedgeId) -> Option<Ledge>;

    /// Whether `point` is outside the blast zone.
    fn check_point_out_of_bounds(&self, point: Vec2) -> bool;
}

// ---------------------------------------------------------------------------
// FlatStage
// ---------------------------------------------------------------------------

/// An axis-aligned solid block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub min: Vec2,
    pub max: Vec2,
}

/// A one-way platform: solid from above only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub min_x: f32,
    pub max_x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy)]
struct Surface {
    min_x: f32,
    max_x: f32,
    y: f32,
    platform: bool,
}

/// Reference stage: a solid block, optional platforms, two ledges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatStage {
    pub ground: Block,
    pub platforms: Vec<Platform>,
    pub blast_min: Vec2,
    pub blast_max: Vec2,
    /// Distance from a ledge's hang position within which it is caught.
    pub ledge_catch_range: Vec2,
}

impl Default for FlatStage {
    fn default() -> Self {
        Self {
            ground: Block {
                min: Vec2::new(-10.0, -4.0),
                max: Vec2::new(10.0, 0.0),
            },
            platforms: Vec::new(),
            blast_min: Vec2::new(-20.0, -8.0),
            blast_max: Vec2::new(20.0, 16.0),
            ledge_catch_range: Vec2::new(1.0, 1.0),
        }
    }
}

impl FlatStage {
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platforms.push(platform);
        self
    }

    fn ledges(&self) -> [Ledge; 2] {
        [
            Ledge {
                position: Vec2::new(self.ground.min.x, self.ground.max.y),
                direction: -1,
            },
            Ledge {
                position: Vec2::new(self.ground.max.x, self.ground.max.y),
                direction: 1,
            },
        ]
    }

    fn surfaces(&self) -> impl Iterator<Item = Surface> + '_ {
        let ground = Surface {
            min_x: self.ground.min.x,
            max_x: self.ground.max.x,
            y: self.ground.max.y,
            platform: false,
        };
        std::iter::once(ground).chain(self.platforms.iter().map(|p| Surface {
            min_x: p.min_x,
            max_x: p.max_x,
            y: p.y,
            platform: true,
        }))
    }

    /// The surface the feet rest on at `position`, if any.
    fn support(&self, position: Vec2, ignore_platforms: bool) -> Option<Surface> {
        self.surfaces().find(|s| {
            (!s.platform || !ignore_platforms)
                && (position.y - s.y).abs() <= SURFACE_EPSILON
                && position.x >= s.min_x
                && position.x <= s.max_x
        })
    }
}

impl Stage for FlatStage {
    fn attempt_move(
        &self,
        diamond: &Diamond,
        current: Vec2,
        target: Vec2,
        edge_stop: bool,
        ignore_platforms: bool,
    ) -> MoveAttempt {
        let mut out = MoveAttempt::default();
        let ground = self.ground;
        let half_width = diamond.half_width;
        let height = diamond.height();

        // Horizontal pass.
        let mut x = target.x;
        if edge_stop {
            if let Some(surface) = self.support(current, ignore_platforms) {
                if x < surface.min_x {
                    x = surface.min_x;
                    out.edge = -1;
                } else if x > surface.max_x {
                    x = surface.max_x;
                    out.edge = 1;
                }
            }
        }
        let beside_block =
            current.y < ground.max.y - SURFACE_EPSILON && current.y + height > ground.min.y;
        if beside_block {
            let left_face = ground.min.x - half_width;
            let right_face = ground.max.x + half_width;
            if current.x <= left_face + SURFACE_EPSILON && x > left_face {
                x = left_face;
                out.collide_wall = true;
            } else if current.x >= right_face - SURFACE_EPSILON && x < right_face {
                x = right_face;
                out.collide_wall = true;
            }
        }

        // Vertical pass.
        let mut y = target.y;
        if y <= current.y {
            let landing = self
                .surfaces()
                .filter(|s| !(s.platform && ignore_platforms))
                .filter(|s| current.y >= s.y - SURFACE_EPSILON && y <= s.y)
                .filter(|s| x >= s.min_x && x <= s.max_x)
                .max_by(|a, b| a.y.total_cmp(&b.y));
            if let Some(surface) = landing {
                y = surface.y;
                out.collide_floor = true;
                out.on_platform = surface.platform;
            }
        } else {
            let overlaps_x = x + half_width > ground.min.x && x - half_width < ground.max.x;
            if overlaps_x
                && current.y + height <= ground.min.y + SURFACE_EPSILON
                && y + height > ground.min.y
            {
                y = ground.min.y - height;
                out.collide_ceiling = true;
            }
        }

        out.collide_corner = out.collide_wall && (out.collide_floor || out.collide_ceiling);
        out.result = Vec2::new(x, y);
        out
    }

    fn find_ledge(&self, diamond: &Diamond, position: Vec2, input_x: i8) -> Option<LedgeId> {
        self.ledges()
            .iter()
            .enumerate()
            .filter(|(_, ledge)| input_x != ledge.direction)
            .find(|(_, ledge)| {
                let delta = position - ledge.hang_position(diamond);
                delta.x.abs() <= self.ledge_catch_range.x && delta.y.abs() <= self.ledge_catch_range.y
            })
            .map(|(i, _)| LedgeId(i as u16))
    }

    fn ledge(&self, id: LedgeId) -> Option<Ledge> {
        self.ledges().get(usize::from(id.0)).copied()
    }

    fn check_point_out_of_bounds(&self, point: Vec2) -> bool {
        point.x < self.blast_min.x
            || point.x > self.blast_max.x
            || point.y < self.blast_min.y
            || point.y > self.blast_max.y
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
