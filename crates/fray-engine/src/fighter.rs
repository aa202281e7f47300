//! Per-fighter simulation data.

use std::borrow::Cow;

use fray_core::attributes::{Attributes, NO_LEDGE_CATCH_TIME, SHIELD_MAX_HP};
use fray_core::command::CommandBuffer;
use fray_core::input::{Controller, InputFrame};
use fray_core::math::{self, Affine3A, Vec2};
use fray_core::prelude::{ActionStatus, VolumeId};
use fray_core::FighterIndex;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::stage::{Diamond, LedgeId};
use crate::state::{StateKind, Transition};

/// Where a fighter starts, and returns to after a knockout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec2,
    pub facing: i8,
}

impl Pose {
    pub const fn new(x: f32, y: f32, facing: i8) -> Self {
        Self {
            position: Vec2::new(x, y),
            facing,
        }
    }
}

/// Spawn poses for a match of `count` fighters.
///
/// Fighters face the centre; the second half of the roster faces left.
pub fn spawn_poses(count: usize) -> Vec<Pose> {
    match count {
        0 => Vec::new(),
        1 => vec![Pose::new(0.0, 0.0, 1)],
        2 => vec![Pose::new(-2.0, 0.0, 1), Pose::new(2.0, 0.0, -1)],
        3 => vec![
            Pose::new(-2.0, 0.0, 1),
            Pose::new(0.0, 0.0, 1),
            Pose::new(2.0, 0.0, -1),
        ],
        _ => vec![
            Pose::new(-6.0, 0.0, 1),
            Pose::new(-2.0, 0.0, 1),
            Pose::new(2.0, 0.0, -1),
            Pose::new(6.0, 0.0, -1),
        ],
    }
}

/// The state a fighter returns to when hitstop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenState {
    pub state: StateKind,
    pub progress: u32,
}

/// Animation cues for the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimCue {
    pub current: Option<Cow<'static, str>>,
    pub fade: u8,
    /// Plays when `current` ends.
    pub next: Option<Cow<'static, str>>,
    pub next_fade: u8,
}

impl AnimCue {
    pub fn is(&self, name: &str) -> bool {
        self.current.as_deref() == Some(name)
    }

    /// Play `now` immediately and queue `after`.
    pub fn play(&mut self, now: &'static str, after: Option<&'static str>) {
        self.current = Some(Cow::Borrowed(now));
        self.fade = 0;
        self.next = after.map(Cow::Borrowed);
        self.next_fade = 0;
    }

    /// Apply a transition's cues. A transition without animations keeps the
    /// current ones.
    pub(crate) fn apply(&mut self, transition: &Transition) {
        if let Some(now) = &transition.anim_now {
            self.current = Some(now.clone());
            self.fade = transition.fade_now;
            self.next = transition.anim_after.clone();
            self.next_fade = transition.fade_after;
        }
    }
}

/// Mutable per-tick physical variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variables {
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing: i8,
    /// Accumulated damage percent.
    pub damage: f32,
    pub shield: f32,
    pub on_ground: bool,
    pub on_platform: bool,
    /// Edge the last move stopped at: -1, 0 or 1.
    pub edge: i8,
    /// Remaining knockback speed, decayed every tick.
    pub launch_speed: f32,
    pub hitstun: u32,
    pub freeze_time: u32,
    /// Set while airborne, cleared by touching down.
    pub fast_fall: bool,
    /// The next move passes through one-way platforms.
    pub drop_through: bool,
    pub extra_jumps: u8,
    pub jump_held: bool,
    pub time_since_ledge: u32,
    pub ledge: Option<LedgeId>,
    pub vertigo: bool,
    /// Ticks left in shield stun after a block.
    pub shield_stun: u32,
    /// Fighter this one holds in a grab.
    pub holding: Option<FighterIndex>,
    /// Fighter holding this one.
    pub held_by: Option<FighterIndex>,
    /// Ticks until a held fighter breaks free.
    pub grab_time: u32,
    /// Root-motion offset applied by the next move, then cleared.
    pub translate: Vec2,
}

impl Variables {
    pub fn spawned(pose: Pose, attributes: &Attributes) -> Self {
        Self {
            position: pose.position,
            velocity: Vec2::ZERO,
            facing: pose.facing,
            damage: 0.0,
            shield: SHIELD_MAX_HP,
            on_ground: true,
            on_platform: false,
            edge: 0,
            launch_speed: 0.0,
            hitstun: 0,
            freeze_time: 0,
            fast_fall: false,
            drop_through: false,
            extra_jumps: attributes.extra_jumps,
            jump_held: false,
            time_since_ledge: NO_LEDGE_CATCH_TIME + 1,
            ledge: None,
            vertigo: false,
            shield_stun: 0,
            holding: None,
            held_by: None,
            grab_time: 0,
            translate: Vec2::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Fighter
// ---------------------------------------------------------------------------

/// One fighter: controller, command history, physical variables, state and
/// current action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fighter {
    pub index: FighterIndex,
    pub name: String,
    pub attributes: Attributes,
    pub spawn: Pose,
    pub controller: Controller,
    /// Discretised input for the current tick.
    pub input: InputFrame,
    pub commands: CommandBuffer,
    pub vars: Variables,
    pub state: StateKind,
    /// Ticks spent in the current state.
    pub state_progress: u32,
    pub frozen: Option<FrozenState>,
    pub action: Option<Action>,
    pub anim: AnimCue,
    pub hurt_volumes: Vec<VolumeId>,
    /// Bone matrices supplied by the animation layer.
    pub bones: Vec<Affine3A>,
    /// Presentation-only shake while flinching in hitstop.
    pub jitter: Vec2,
    /// Pose at the start of the current tick, for interpolation.
    pub previous: Pose,
}

impl Fighter {
    pub fn new(
        index: FighterIndex,
        name: impl Into<String>,
        attributes: Attributes,
        spawn: Pose,
        command_depth: usize,
    ) -> Self {
        let vars = Variables::spawned(spawn, &attributes);
        let mut anim = AnimCue::default();
        anim.play(crate::state::anim::NEUTRAL_LOOP, None);
        Self {
            index,
            name: name.into(),
            attributes,
            spawn,
            controller: Controller::new(),
            input: InputFrame::default(),
            commands: CommandBuffer::new(command_depth),
            vars,
            state: StateKind::Neutral,
            state_progress: 0,
            frozen: None,
            action: None,
            anim,
            hurt_volumes: Vec::new(),
            bones: Vec::new(),
            jitter: Vec2::ZERO,
            previous: spawn,
        }
    }

    pub fn diamond(&self) -> Diamond {
        Diamond::from_attributes(&self.attributes)
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.vars.position,
            facing: self.vars.facing,
        }
    }

    pub fn model_matrix(&self) -> Affine3A {
        math::model_matrix(self.vars.position, self.vars.facing)
    }

    /// Status of the current action, `None` without one.
    pub fn action_status(&self) -> ActionStatus {
        self.action
            .as_ref()
            .map_or(ActionStatus::None, |a| a.status)
    }

    /// Pose blended between the previous and current tick, plus jitter.
    ///
    /// `blend` is clamped to `[0, 1]`. Facing snaps at the halfway point.
    pub fn interpolate(&self, blend: f32) -> Pose {
        let t = blend.clamp(0.0, 1.0);
        let position = self.previous.position + (self.vars.position - self.previous.position) * t;
        let facing = if t < 0.5 {
            self.previous.facing
        } else {
            self.vars.facing
        };
        Pose {
            position: position + self.jitter,
            facing,
        }
    }

    /// Back to the spawn pose with every counter cleared.
    pub(crate) fn respawn(&mut self) {
        self.vars = Variables::spawned(self.spawn, &self.attributes);
        self.frozen = None;
        self.jitter = Vec2::ZERO;
        self.commands.clear();
        self.previous = self.spawn;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fighter() -> Fighter {
        Fighter::new(0, "test", Attributes::default(), Pose::new(-2.0, 0.0, 1), 8)
    }

    #[test]
    fn spawns_grounded_with_full_shield() {
        let f = fighter();
        assert!(f.vars.on_ground);
        assert_eq!(f.vars.shield, SHIELD_MAX_HP);
        assert_eq!(f.state, StateKind::Neutral);
        assert_eq!(f.action_status(), ActionStatus::None);
        assert!(f.anim.is("NeutralLoop"));
    }

    #[test]
    fn spawn_poses_face_centre() {
        for count in 1..=4 {
            let poses = spawn_poses(count);
            assert_eq!(poses.len(), count);
            for pose in poses {
                if pose.position.x > 0.0 {
                    assert_eq!(pose.facing, -1);
                }
                if pose.position.x < 0.0 {
                    assert_eq!(pose.facing, 1);
                }
            }
        }
    }

    #[test]
    fn interpolate_blends_position() {
        let mut f = fighter();
        f.vars.position = Vec2::new(0.0, 1.0);
        f.vars.facing = -1;
        let half = f.interpolate(0.25);
        assert!((half.position.x - -1.5).abs() < 1e-6);
        assert!((half.position.y - 0.25).abs() < 1e-6);
        assert_eq!(half.facing, 1);
        assert_eq!(f.interpolate(2.0).position, Vec2::new(0.0, 1.0));
        assert_eq!(f.interpolate(2.0).facing, -1);
    }

    #[test]
    fn respawn_clears_damage_and_motion() {
        let mut f = fighter();
        f.vars.damage = 80.0;
        f.vars.velocity = Vec2::new(1.0, 1.0);
        f.vars.position = Vec2::new(30.0, 30.0);
        f.respawn();
        assert_eq!(f.vars.damage, 0.0);
        assert_eq!(f.vars.velocity, Vec2::ZERO);
        assert_eq!(f.vars.position, Vec2::new(-2.0, 0.0));
    }

    #[test]
    fn transition_without_anim_keeps_cue() {
        let mut cue = AnimCue::default();
        cue.play("A", Some("B"));
        cue.apply(&Transition::to(StateKind::Freeze));
        assert!(cue.is("A"));
        cue.apply(&Transition::to(StateKind::Neutral).play(3, "C"));
        assert!(cue.is("C"));
        assert_eq!(cue.fade, 3);
        assert!(cue.next.is_none());
    }
}
