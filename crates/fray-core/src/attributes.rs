//! Per-fighter tuning values and global gameplay constants.
//!
//! Distances are stage units, speeds are units per tick and durations are
//! ticks.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum fighters in one match.
pub const MAX_FIGHTERS: usize = 4;

/// Default simulation rate in ticks per second.
pub const DEFAULT_TICK_RATE: u32 = 48;

/// Default per-tick reduction of launch speed.
pub const KNOCKBACK_DECAY: f32 = 0.0051;

/// Default damage difference under which two hit volumes clang.
pub const CLANG_THRESHOLD: f32 = 9.0;

/// Hitstun at or above which the victim uses heavy flinch animations.
pub const MIN_HITSTUN_HEAVY: u32 = 20;

/// Hitstun at or above which the victim tumbles.
pub const MIN_HITSTUN_TUMBLE: u32 = 32;

/// Ticks between pressing jump and leaving the ground.
pub const JUMP_DELAY: u32 = 4;

/// Ticks after letting go of a ledge before another can be caught.
pub const NO_LEDGE_CATCH_TIME: u32 = 48;

/// Ticks a fighter must hang before ledge options are accepted.
pub const LEDGE_HANG_MIN_TIME: u32 = 8;

pub const SHIELD_MAX_HP: f32 = 50.0;
pub const SHIELD_DECAY: f32 = 0.15;
pub const SHIELD_REGEN: f32 = 0.1;

/// Rebound damage for a grab that clangs with another grab or is lost to a
/// circular grab.
pub const GRAB_REBOUND_DAMAGE: f32 = 5.0;

/// Ticks a grab holds a victim at 0% before it breaks free.
pub const GRAB_HOLD_BASE: u32 = 40;

/// Horizontal distance a held victim is kept from its grabber.
pub const GRAB_HOLD_DISTANCE: f32 = 0.8;

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Stats that don't change during a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    pub walk_speed: f32,
    pub dash_speed: f32,
    pub air_speed: f32,
    pub traction: f32,
    pub air_mobility: f32,
    pub air_friction: f32,

    pub hop_height: f32,
    pub jump_height: f32,
    pub air_hop_height: f32,
    pub gravity: f32,
    pub fall_speed: f32,
    pub fast_fall_speed: f32,
    pub weight: f32,

    pub extra_jumps: u8,
    pub light_land_time: u32,
    pub heavy_land_time: u32,
    pub tumble_land_time: u32,
    /// Falling for fewer ticks than this always lands light.
    pub land_heavy_min_time: u32,

    pub dash_start_time: u32,
    pub dash_brake_time: u32,
    pub dash_turn_time: u32,
    pub ledge_climb_time: u32,

    /// Horizontal half extent of the stage-collision diamond.
    pub diamond_half_width: f32,
    /// Height of the diamond's widest point above the feet.
    pub diamond_offset_cross: f32,
    /// Height of the diamond's top above the cross.
    pub diamond_offset_top: f32,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            walk_speed: 0.1,
            dash_speed: 0.15,
            air_speed: 0.1,
            traction: 0.005,
            air_mobility: 0.008,
            air_friction: 0.002,

            hop_height: 1.5,
            jump_height: 3.5,
            air_hop_height: 3.5,
            gravity: 0.01,
            fall_speed: 0.15,
            fast_fall_speed: 0.24,
            weight: 100.0,

            extra_jumps: 2,
            light_land_time: 4,
            heavy_land_time: 8,
            tumble_land_time: 12,
            land_heavy_min_time: 6,

            dash_start_time: 10,
            dash_brake_time: 12,
            dash_turn_time: 10,
            ledge_climb_time: 20,

            diamond_half_width: 0.4,
            diamond_offset_cross: 1.4,
            diamond_offset_top: 0.8,
        }
    }
}

impl Attributes {
    /// Take-off speed reaching `height` under this fighter's gravity, plus a
    /// half tick of gravity so the apex lands on the intended height.
    pub fn launch_speed_for_height(&self, height: f32) -> f32 {
        (2.0 * height * self.gravity).sqrt() + self.gravity * 0.5
    }
}
