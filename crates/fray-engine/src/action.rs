//! Running action scripts.
//!
//! An [`Action`] owns one script task and the hit volumes that task has
//! enabled. The task is resumed once per tick with the action's frame; calls
//! it makes are applied immediately and validated against the fighter's
//! [`ActionDef`]. Invalid references and script failures move the action to
//! [`ActionStatus::RuntimeError`].

use std::collections::BTreeMap;

use fray_core::action::{ActionKind, ActionStatus};
use fray_core::arena::{VolumeArena, VolumeId};
use fray_core::attributes::Attributes;
use fray_core::volume::HitVolume;
use fray_core::FighterIndex;
use fray_defs::action_def::ActionDef;
use fray_script::{
    ScriptCall, ScriptContext, ScriptError, ScriptId, ScriptRuntime, TaskHandle, TaskStatus,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collision::HitBits;
use crate::events::GameEvent;

/// Script used for an action the fighter definition doesn't provide.
///
/// Landing lag and ledge climbs wait out the fighter's attribute timings;
/// attacks open their interrupt window straight away; everything else
/// finishes immediately.
pub fn fallback_script(kind: ActionKind, attributes: &Attributes) -> String {
    let wait = |frames: u32| format!("wait_until {}", frames.max(1));
    match kind {
        ActionKind::LandLight => wait(attributes.light_land_time),
        ActionKind::LandHeavy | ActionKind::LandAttack => wait(attributes.heavy_land_time),
        ActionKind::LandTumble => wait(attributes.tumble_land_time),
        ActionKind::LedgeClimb => wait(attributes.ledge_climb_time),
        k if k.needs_interrupt() => "allow_interrupt".to_owned(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// ActionHost
// ---------------------------------------------------------------------------

/// Everything an action touches outside its fighter.
pub struct ActionHost {
    pub runtime: Box<dyn ScriptRuntime>,
    pub hit_volumes: VolumeArena<HitVolume>,
    pub hit_bits: HitBits,
}

impl ActionHost {
    pub fn env<'a>(
        &'a mut self,
        owner: FighterIndex,
        def: Option<&'a ActionDef>,
        events: &'a mut Vec<GameEvent>,
        check_desync: bool,
    ) -> ActionEnv<'a> {
        ActionEnv {
            owner,
            host: self,
            def,
            events,
            check_desync,
        }
    }
}

/// Borrowed view handed to [`Action`] methods.
pub struct ActionEnv<'a> {
    pub owner: FighterIndex,
    pub host: &'a mut ActionHost,
    pub def: Option<&'a ActionDef>,
    pub events: &'a mut Vec<GameEvent>,
    pub check_desync: bool,
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Result of ticking an action once.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionTick {
    Continue,
    Finished,
    /// The action entered [`ActionStatus::RuntimeError`] with this message.
    Failed(String),
}

/// A running instance of an action script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub status: ActionStatus,
    /// Frames run since the script started.
    pub frame: u32,
    script: ScriptId,
    task: Option<TaskHandle>,
    /// The script ran off its end; the action finishes on the next tick.
    script_done: bool,
    /// Enabled hit blobs by key.
    volumes: BTreeMap<String, VolumeId>,
    pub error: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind, script: ScriptId) -> Self {
        Self {
            kind,
            status: ActionStatus::None,
            frame: 0,
            script,
            task: None,
            script_done: false,
            volumes: BTreeMap::new(),
            error: None,
        }
    }

    pub fn volumes(&self) -> impl Iterator<Item = VolumeId> + '_ {
        self.volumes.values().copied()
    }

    /// Start the script from the top. Clears the owner's hit bits.
    pub fn start(&mut self, env: &mut ActionEnv<'_>) -> Result<(), ScriptError> {
        self.release_task(env);
        self.clear_volumes(env);
        env.host.hit_bits.reset_attacker(env.owner);
        let task = env.host.runtime.start(self.script)?;
        self.task = Some(task);
        self.status = ActionStatus::Running;
        self.frame = 0;
        self.script_done = false;
        self.error = None;
        debug!(fighter = env.owner, action = %self.kind, "action started");
        env.events.push(GameEvent::ActionStarted {
            fighter: env.owner,
            action: self.kind,
        });
        Ok(())
    }

    /// Run one frame of the script.
    pub fn tick(&mut self, env: &mut ActionEnv<'_>) -> ActionTick {
        match self.status {
            ActionStatus::None | ActionStatus::Finished => return ActionTick::Continue,
            ActionStatus::RuntimeError => {
                // Recovered failure: tidy up and finish.
                self.clear_volumes(env);
                env.host.hit_bits.reset_attacker(env.owner);
                self.status = ActionStatus::Finished;
                return ActionTick::Finished;
            }
            ActionStatus::Running | ActionStatus::AllowInterrupt => {}
        }

        if self.script_done {
            if self.status == ActionStatus::Running && self.kind.needs_interrupt() {
                return self.fail(env, "returned before calling allow_interrupt".to_owned());
            }
            self.finish(env);
            return ActionTick::Finished;
        }

        let Some(task) = self.task else {
            return self.fail(env, "no script task".to_owned());
        };
        let mut ctx = ScriptContext::new(self.frame);
        let status = env.host.runtime.resume(task, &mut ctx);
        if env.check_desync && ctx.is_desynced() {
            warn!(
                fighter = env.owner,
                action = %self.kind,
                frame = self.frame,
                reported = ?ctx.reported_frame,
                "script timeline out of step with action frame"
            );
        }

        for call in ctx.drain_calls() {
            if let Err(e) = self.apply_call(call, env) {
                return self.fail(env, e.to_string());
            }
        }

        match status {
            TaskStatus::Running | TaskStatus::Yielded { .. } => {}
            TaskStatus::Finished => self.script_done = true,
            TaskStatus::Failed(e) => return self.fail(env, e.to_string()),
        }
        self.frame += 1;
        ActionTick::Continue
    }

    /// Stop the action early. Clears the owner's hit bits.
    pub fn cancel(&mut self, env: &mut ActionEnv<'_>) {
        self.release_task(env);
        self.clear_volumes(env);
        env.host.hit_bits.reset_attacker(env.owner);
        if self.status != ActionStatus::RuntimeError {
            self.status = ActionStatus::Finished;
        }
        debug!(fighter = env.owner, action = %self.kind, frame = self.frame, "action cancelled");
    }

    fn finish(&mut self, env: &mut ActionEnv<'_>) {
        self.release_task(env);
        self.clear_volumes(env);
        self.status = ActionStatus::Finished;
    }

    fn fail(&mut self, env: &mut ActionEnv<'_>, message: String) -> ActionTick {
        let message = format!("frame {}:\n{}", self.frame, message);
        self.release_task(env);
        self.status = ActionStatus::RuntimeError;
        self.error = Some(message.clone());
        ActionTick::Failed(message)
    }

    fn release_task(&mut self, env: &mut ActionEnv<'_>) {
        if let Some(task) = self.task.take() {
            env.host.runtime.release(task);
        }
    }

    fn clear_volumes(&mut self, env: &mut ActionEnv<'_>) {
        for id in std::mem::take(&mut self.volumes).into_values() {
            env.host.hit_volumes.remove(id);
        }
    }

    fn apply_call(&mut self, call: ScriptCall, env: &mut ActionEnv<'_>) -> Result<(), ScriptError> {
        match call {
            ScriptCall::EnableHitblobs { prefix } => {
                let mut enabled = 0;
                if let Some(def) = env.def {
                    for (key, blob) in def.blobs_with_prefix(&prefix) {
                        enabled += 1;
                        if self.volumes.contains_key(key) {
                            continue;
                        }
                        let volume = HitVolume::new(key, env.owner, self.kind, blob.clone());
                        let id = env.host.hit_volumes.insert(volume);
                        self.volumes.insert(key.to_owned(), id);
                    }
                }
                if enabled == 0 {
                    return Err(ScriptError::InvalidReference {
                        kind: "hitblob".to_owned(),
                        key: format!("{prefix}*"),
                    });
                }
            }
            ScriptCall::DisableHitblobs { reset_collisions } => {
                self.clear_volumes(env);
                if reset_collisions {
                    env.host.hit_bits.reset_attacker(env.owner);
                }
            }
            ScriptCall::ResetCollisions => env.host.hit_bits.reset_attacker(env.owner),
            ScriptCall::AllowInterrupt => {
                if !self.kind.needs_interrupt() {
                    return Err(ScriptError::Raised(format!(
                        "{} can't be interrupted",
                        self.kind
                    )));
                }
                self.status = ActionStatus::AllowInterrupt;
            }
            ScriptCall::PlayEffect { key } => {
                if !env.def.is_some_and(|d| d.effects.contains_key(&key)) {
                    return Err(ScriptError::InvalidReference {
                        kind: "effect".to_owned(),
                        key,
                    });
                }
                env.events.push(GameEvent::PlayEffect {
                    fighter: env.owner,
                    key,
                });
            }
            ScriptCall::EmitParticles { key } => {
                if !env.def.is_some_and(|d| d.emitters.contains_key(&key)) {
                    return Err(ScriptError::InvalidReference {
                        kind: "emitter".to_owned(),
                        key,
                    });
                }
                env.events.push(GameEvent::EmitParticles {
                    fighter: env.owner,
                    key,
                });
            }
            ScriptCall::PlaySound { key } => env.events.push(GameEvent::PlaySound {
                fighter: env.owner,
                key,
            }),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fray_core::math::Vec3;
    use fray_core::volume::HitVolumeDef;
    use fray_script::{ScriptConfig, TimelineRuntime};

    fn blob(group: u8) -> HitVolumeDef {
        HitVolumeDef {
            origin: Vec3::new(0.5, 1.0, 0.0),
            group,
            damage: 8.0,
            ..HitVolumeDef::default()
        }
    }

    fn def() -> ActionDef {
        let mut def = ActionDef::default();
        def.blobs.insert("hit_a".to_owned(), blob(0));
        def.blobs.insert("hit_b".to_owned(), blob(1));
        def.blobs.insert("late".to_owned(), blob(2));
        def
    }

    fn host() -> ActionHost {
        ActionHost {
            runtime: Box::new(TimelineRuntime::new(ScriptConfig::default())),
            hit_volumes: VolumeArena::with_capacity(16),
            hit_bits: HitBits::default(),
        }
    }

    /// Compile `src`, start it and tick until it stops continuing.
    fn run(
        kind: ActionKind,
        src: &str,
        ticks: u32,
    ) -> (Action, ActionHost, Vec<GameEvent>, Vec<ActionTick>) {
        let mut host = host();
        let def = def();
        let mut events = Vec::new();
        let script = host.runtime.compile("test", src).unwrap();
        let mut action = Action::new(kind, script);
        let mut results = Vec::new();
        {
            let mut env = host.env(0, Some(&def), &mut events, true);
            action.start(&mut env).unwrap();
            for _ in 0..ticks {
                let result = action.tick(&mut env);
                let stop = result != ActionTick::Continue;
                results.push(result);
                if stop {
                    break;
                }
            }
        }
        (action, host, events, results)
    }

    // -- 1. Lifecycle -------------------------------------------------------

    #[test]
    fn attack_finishes_after_interrupt_and_end() {
        let (action, _, _, results) = run(
            ActionKind::NeutralFirst,
            "wait_until 2\nallow_interrupt\nwait_until 4",
            20,
        );
        assert_eq!(action.status, ActionStatus::Finished);
        assert_eq!(results.len(), 6, "frames 0..=4 then finish");
        assert_eq!(results.last(), Some(&ActionTick::Finished));
    }

    #[test]
    fn interrupt_window_opens_on_its_frame() {
        let (action, _, _, _) = run(
            ActionKind::NeutralFirst,
            "wait_until 2\nallow_interrupt\nwait_until 9",
            3,
        );
        assert_eq!(action.status, ActionStatus::AllowInterrupt);
    }

    #[test]
    fn attack_without_interrupt_fails() {
        let (action, _, _, results) = run(ActionKind::TiltUp, "wait_until 1", 10);
        assert_eq!(action.status, ActionStatus::RuntimeError);
        match results.last() {
            Some(ActionTick::Failed(msg)) => {
                assert!(msg.starts_with("frame 2:\n"), "{msg}");
                assert!(msg.contains("allow_interrupt"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn non_attack_rejects_interrupt() {
        let (action, _, _, results) = run(ActionKind::Dodge, "allow_interrupt", 3);
        assert_eq!(action.status, ActionStatus::RuntimeError);
        assert!(matches!(results.last(), Some(ActionTick::Failed(_))));
    }

    #[test]
    fn empty_script_finishes_next_tick() {
        let (action, _, _, results) = run(ActionKind::Dodge, "", 5);
        assert_eq!(results, vec![ActionTick::Continue, ActionTick::Finished]);
        assert_eq!(action.status, ActionStatus::Finished);
    }

    // -- 2. Hit blobs -------------------------------------------------------

    #[test]
    fn enable_by_prefix_and_clean_up() {
        let (action, host, _, _) = run(
            ActionKind::NeutralFirst,
            "enable_hitblobs \"hit_\"\nwait_until 3\nallow_interrupt\nwait_until 5",
            2,
        );
        assert_eq!(action.volumes().count(), 2);
        assert_eq!(host.hit_volumes.len(), 2);

        let (finished, host, _, _) = run(
            ActionKind::NeutralFirst,
            "enable_hitblobs \"hit_\"\nallow_interrupt",
            10,
        );
        assert_eq!(finished.status, ActionStatus::Finished);
        assert_eq!(finished.volumes().count(), 0);
        assert!(host.hit_volumes.is_empty());
    }

    #[test]
    fn unknown_prefix_is_runtime_error() {
        let (action, _, _, _) = run(ActionKind::NeutralFirst, "enable_hitblobs \"nope\"", 2);
        assert_eq!(action.status, ActionStatus::RuntimeError);
        assert!(action.error.as_deref().unwrap().contains("nope*"));
    }

    #[test]
    fn unknown_effect_is_runtime_error() {
        let (action, _, events, _) = run(ActionKind::Dodge, "play_effect \"sparks\"", 2);
        assert_eq!(action.status, ActionStatus::RuntimeError);
        assert!(!events.iter().any(|e| matches!(e, GameEvent::PlayEffect { .. })));
    }

    #[test]
    fn sounds_pass_through() {
        let (_, _, events, _) = run(ActionKind::Dodge, "play_sound \"whoosh\"", 2);
        assert!(events.contains(&GameEvent::PlaySound {
            fighter: 0,
            key: "whoosh".to_owned()
        }));
    }

    #[test]
    fn cancel_releases_everything() {
        let mut host = host();
        let def = def();
        let mut events = Vec::new();
        let script = host
            .runtime
            .compile("t", "enable_hitblobs \"hit_a\"\nwait_until 9\nallow_interrupt")
            .unwrap();
        let mut action = Action::new(ActionKind::TiltUp, script);
        let mut env = host.env(0, Some(&def), &mut events, false);
        action.start(&mut env).unwrap();
        action.tick(&mut env);
        action.cancel(&mut env);
        assert_eq!(action.status, ActionStatus::Finished);
        drop(env);
        assert!(host.hit_volumes.is_empty());
    }

    #[test]
    fn cancel_clears_hit_bits() {
        let mut host = host();
        let def = def();
        let mut events = Vec::new();
        let script = host
            .runtime
            .compile("t", "enable_hitblobs \"hit_\"\nwait_until 9\nallow_interrupt")
            .unwrap();
        let mut action = Action::new(ActionKind::TiltUp, script);
        let mut env = host.env(0, Some(&def), &mut events, false);
        action.start(&mut env).unwrap();
        action.tick(&mut env);
        env.host.hit_bits.set(0, 1, 0);
        env.host.hit_bits.set(0, 2, 1);
        env.host.hit_bits.set(1, 0, 0);
        action.cancel(&mut env);
        drop(env);
        assert_eq!(host.hit_bits.mask(0, 1), 0);
        assert_eq!(host.hit_bits.mask(0, 2), 0);
        assert!(host.hit_bits.is_set(1, 0, 0), "other attackers keep their bits");
    }

    // -- 3. Fallback scripts ------------------------------------------------

    #[test]
    fn fallbacks_follow_attributes() {
        let attributes = Attributes::default();
        assert_eq!(
            fallback_script(ActionKind::LandHeavy, &attributes),
            format!("wait_until {}", attributes.heavy_land_time)
        );
        assert_eq!(fallback_script(ActionKind::SmashUp, &attributes), "allow_interrupt");
        assert_eq!(fallback_script(ActionKind::Dodge, &attributes), "");
    }
}
