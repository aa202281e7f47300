//! Fixed-timestep simulation driver.
//!
//! The [`Simulation`] advances the whole match by one fixed step per call to
//! [`Simulation::tick`]. Each tick:
//!
//! 1. Every fighter, in index order:
//!    a. discretises its input sample and pushes this frame's commands,
//!    b. runs its action script (if its state hosts a running action) and
//!       otherwise evaluates its state's transition table, applying at most
//!       one [`Step`],
//!    c. integrates physics under the resulting state's [`Motion`] and lets
//!       the state react to the terrain contact (fall, land),
//!    d. updates vertigo and shield health.
//! 2. Every hit and hurt volume is posed from its owner's transform.
//! 3. The [`CollisionResolver`] arbitrates clangs, hits and grabs. Victims
//!    and attackers enter hitstop, raised shields absorb hits, confirmed
//!    grabs link grabber and victim, clang losers rebound.
//! 4. Fighters outside the blast zone are knocked out and respawn.
//! 5. Grabs whose grabber or victim has moved on are released.
//! 6. The tick counter advances.
//!
//! All observable occurrences are returned in a [`TickReport`].
//!
//! # Example
//!
//! ```
//! use fray_engine::prelude::*;
//!
//! let defs = vec![FighterDef::default(), FighterDef::default()];
//! let mut sim = Simulation::new(SimulationConfig::default(), FlatStage::default(), defs).unwrap();
//!
//! sim.set_sample(0, InputSample { axis_x: 1.0, ..Default::default() }).unwrap();
//! sim.run_ticks(10).unwrap();
//!
//! assert_eq!(sim.tick_count(), 10);
//! assert!(sim.fighter(0).unwrap().vars.position.x > -2.0);
//! ```

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use fray_core::action::{ActionKind, ActionStatus};
use fray_core::arena::VolumeArena;
use fray_core::attributes::{
    GRAB_HOLD_DISTANCE, MAX_FIGHTERS, SHIELD_DECAY, SHIELD_MAX_HP, SHIELD_REGEN,
};
use fray_core::input::InputSample;
use fray_core::math::{Affine3A, Vec2};
use fray_core::volume::{HitVolume, HurtVolume};
use fray_core::FighterIndex;
use fray_defs::action_def::ActionDef;
use fray_defs::fighter_def::FighterDef;
use fray_script::{ScriptConfig, ScriptError, ScriptId, ScriptRuntime, TimelineRuntime};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::action::{fallback_script, Action, ActionHost, ActionTick};
use crate::collision::{Body, CollisionOutcome, CollisionResolver, HitBits};
use crate::config::SimulationConfig;
use crate::events::{GameEvent, TickReport};
use crate::fighter::{spawn_poses, Fighter, FrozenState, Pose};
use crate::hit::grab_hold_time;
use crate::physics;
use crate::stage::{LedgeClaims, Stage};
use crate::state::{
    anim, end_transition, let_go, state_for_action, Footing, StateEnv, StateKind, StateRegistry,
    Step, Transition,
};
use crate::SimError;

// ---------------------------------------------------------------------------
// TickInput
// ---------------------------------------------------------------------------

/// Raw input samples for every fighter for one tick.
///
/// Trailing idle samples are trimmed so an idle tick compares equal to
/// [`TickInput::default`] and is skipped by replay recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    samples: Vec<InputSample>,
}

impl TickInput {
    pub fn new(samples: Vec<InputSample>) -> Self {
        let mut input = Self { samples };
        input.trim();
        input
    }

    /// The sample for `fighter`; idle when none was given.
    pub fn sample(&self, fighter: FighterIndex) -> InputSample {
        self.samples.get(fighter).copied().unwrap_or_default()
    }

    pub fn set(&mut self, fighter: FighterIndex, sample: InputSample) {
        if fighter >= self.samples.len() {
            self.samples.resize(fighter + 1, InputSample::default());
        }
        self.samples[fighter] = sample;
        self.trim();
    }

    pub fn samples(&self) -> &[InputSample] {
        &self.samples
    }

    /// No fighter has any input.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn trim(&mut self) {
        while self.samples.last() == Some(&InputSample::default()) {
            self.samples.pop();
        }
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing information collected during a single tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time spent on each fighter, in index order.
    pub fighter_times: Vec<Duration>,
    /// Posing volumes, resolving collisions and applying hits.
    pub collision_time: Duration,
    /// Total wall-clock time for the entire tick.
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// The deterministic match simulation.
///
/// Given the same definitions, configuration and per-tick inputs, two
/// simulations produce identical state after every tick.
pub struct Simulation {
    config: SimulationConfig,
    stage: Box<dyn Stage>,
    registry: StateRegistry,
    /// Script runtime, live hit volumes and the hit-bits matrix.
    host: ActionHost,
    defs: Vec<FighterDef>,
    /// Compiled script per fighter and action.
    scripts: Vec<BTreeMap<ActionKind, ScriptId>>,
    fighters: Vec<Fighter>,
    hurt_volumes: VolumeArena<HurtVolume>,
    resolver: CollisionResolver,
    ledges: LedgeClaims,
    /// Presentation jitter only; never feeds back into gameplay.
    rng: Pcg32,
    /// Monotonically increasing tick counter (starts at 0).
    tick_counter: u64,
    /// Input applied on every tick until replaced.
    current_input: TickInput,
    last_diagnostics: TickDiagnostics,
}

impl Simulation {
    /// Start a match with the reference [`TimelineRuntime`] and every
    /// built-in state.
    pub fn new(
        config: SimulationConfig,
        stage: impl Stage + 'static,
        defs: Vec<FighterDef>,
    ) -> Result<Self, SimError> {
        let runtime = TimelineRuntime::new(ScriptConfig {
            op_budget: config.script_op_budget,
        });
        Self::with_runtime(
            config,
            Box::new(stage),
            defs,
            Box::new(runtime),
            StateRegistry::standard(),
        )
    }

    /// Start a match with a custom script runtime and state registry.
    ///
    /// Every definition is validated, every action script is compiled up
    /// front (actions a fighter doesn't define get a fallback script) and
    /// fighters are placed at their spawn poses.
    ///
    /// # Panics
    ///
    /// Panics if `config.tick_rate` is zero.
    pub fn with_runtime(
        config: SimulationConfig,
        stage: Box<dyn Stage>,
        defs: Vec<FighterDef>,
        mut runtime: Box<dyn ScriptRuntime>,
        registry: StateRegistry,
    ) -> Result<Self, SimError> {
        config.validate()?;
        if defs.is_empty() || defs.len() > MAX_FIGHTERS {
            return Err(SimError::FighterCount(defs.len()));
        }
        let missing = registry.missing();
        if !missing.is_empty() {
            return Err(SimError::IncompleteRegistry(missing));
        }

        let mut scripts = Vec::with_capacity(defs.len());
        for (index, def) in defs.iter().enumerate() {
            def.validate()?;
            scripts.push(compile_scripts(runtime.as_mut(), index, def)?);
        }

        let mut hurt_volumes = VolumeArena::with_capacity(config.volume_capacity);
        let fighters = defs
            .iter()
            .zip(spawn_poses(defs.len()))
            .enumerate()
            .map(|(index, (def, spawn))| {
                let mut fighter = Fighter::new(
                    index,
                    def.name.clone(),
                    def.attributes.clone(),
                    spawn,
                    config.command_buffer_depth,
                );
                for (key, blob) in &def.hurt_blobs {
                    let id = hurt_volumes.insert(HurtVolume::new(key.as_str(), index, blob.clone()));
                    fighter.hurt_volumes.push(id);
                }
                fighter
            })
            .collect();

        debug!(
            fighters = defs.len(),
            tick_rate = config.tick_rate,
            editor_mode = config.editor_mode,
            "simulation created"
        );

        Ok(Self {
            host: ActionHost {
                runtime,
                hit_volumes: VolumeArena::with_capacity(config.volume_capacity),
                hit_bits: HitBits::default(),
            },
            rng: Pcg32::seed_from_u64(config.seed),
            config,
            stage,
            registry,
            defs,
            scripts,
            fighters,
            hurt_volumes,
            resolver: CollisionResolver::new(),
            ledges: LedgeClaims::default(),
            tick_counter: 0,
            current_input: TickInput::default(),
            last_diagnostics: TickDiagnostics::default(),
        })
    }

    /// Execute one simulation tick.
    ///
    /// Outside editor mode a script runtime error ends the match: the error
    /// is returned and the simulation should not be ticked again.
    pub fn tick(&mut self) -> Result<TickReport, SimError> {
        let tick_start = Instant::now();
        let mut events = Vec::new();
        let mut fighter_times = Vec::with_capacity(self.fighters.len());

        // Phase 1: fighters, in index order.
        for i in 0..self.fighters.len() {
            let start = Instant::now();
            self.tick_fighter(i, &mut events)?;
            fighter_times.push(start.elapsed());
        }

        // Phase 2: pose volumes and resolve hits.
        let collision_start = Instant::now();
        self.pose_volumes();
        let bodies: Vec<Body> = self
            .fighters
            .iter()
            .map(|f| Body {
                position: f.vars.position,
                facing: f.vars.facing,
                grounded: f.vars.on_ground,
                grabbable: f.state.grabbable(),
            })
            .collect();
        let outcome = self
            .resolver
            .resolve(
                &mut self.host.hit_volumes,
                &self.hurt_volumes,
                &mut self.host.hit_bits,
                &bodies,
                self.config.clang_threshold,
            )
            .clone();
        self.apply_outcome(&outcome, &mut events);
        let collision_time = collision_start.elapsed();

        // Phase 3: blast zone.
        for i in 0..self.fighters.len() {
            let fighter = &self.fighters[i];
            let point = fighter.diamond().cross_point(fighter.vars.position);
            if self.stage.check_point_out_of_bounds(point) {
                self.knock_out(i, &mut events);
            }
        }

        // Phase 4: grabs that lost either side.
        self.sync_grabs(&mut events);

        let report = TickReport {
            tick: self.tick_counter,
            events,
        };
        self.tick_counter += 1;
        self.last_diagnostics = TickDiagnostics {
            fighter_times,
            collision_time,
            total_time: tick_start.elapsed(),
        };
        Ok(report)
    }

    /// Run `count` ticks, returning the total number of events produced.
    pub fn run_ticks(&mut self, count: u64) -> Result<usize, SimError> {
        let mut total = 0;
        for _ in 0..count {
            total += self.tick()?.events.len();
        }
        Ok(total)
    }

    // -- per fighter --------------------------------------------------------

    fn tick_fighter(
        &mut self,
        i: FighterIndex,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), SimError> {
        let sample = self.current_input.sample(i);
        let fighter = &mut self.fighters[i];
        fighter.previous = fighter.pose();
        fighter.input = fighter.controller.update(&sample)?;
        fighter.commands.advance(&fighter.input, fighter.vars.facing);
        if fighter.state != StateKind::LedgeHang {
            fighter.vars.time_since_ledge = fighter.vars.time_since_ledge.saturating_add(1);
        }
        let flinching = fighter.state == StateKind::Freeze
            && matches!(
                fighter.frozen,
                Some(FrozenState {
                    state: StateKind::HitStun | StateKind::TumbleStun,
                    ..
                })
            );
        fighter.jitter = if flinching {
            jitter(&mut self.rng, fighter.vars.freeze_time)
        } else {
            Vec2::ZERO
        };

        let runs_action = fighter.state.runs_action() && fighter.action.is_some();
        let step = match runs_action {
            true => match self.run_action(i, false, events)? {
                Some(step) => Some(step),
                None => self.update_state(i),
            },
            false => self.update_state(i),
        };
        if let Some(step) = step {
            self.apply_step(i, step, events)?;
        }
        self.fighters[i].state_progress += 1;

        let motion = self.registry.state(self.fighters[i].state).motion();
        if motion.footing != Footing::Fixed {
            let fighter = &mut self.fighters[i];
            let contact = physics::integrate(
                fighter,
                &motion,
                self.stage.as_ref(),
                self.config.knockback_decay,
            );
            let state = self.registry.state(fighter.state);
            if let Some(step) = state.on_contact(fighter, &contact) {
                self.apply_step(i, step, events)?;
            }
        }

        let motion = self.registry.state(self.fighters[i].state).motion();
        let fighter = &mut self.fighters[i];
        if motion.vertigo
            && !fighter.vars.vertigo
            && fighter.vars.edge != 0
            && fighter.vars.edge == fighter.vars.facing
        {
            fighter.vars.vertigo = true;
            fighter
                .anim
                .play(anim::VERTIGO_START, Some(anim::VERTIGO_LOOP));
        }

        fighter.vars.shield = match fighter.state {
            StateKind::Shield => (fighter.vars.shield - SHIELD_DECAY).max(0.0),
            StateKind::ShieldStun => fighter.vars.shield,
            _ => (fighter.vars.shield + SHIELD_REGEN).min(SHIELD_MAX_HP),
        };
        Ok(())
    }

    fn update_state(&mut self, i: FighterIndex) -> Option<Step> {
        let fighter = &mut self.fighters[i];
        let state = self.registry.state(fighter.state);
        let mut env = StateEnv {
            stage: self.stage.as_ref(),
            ledges: &mut self.ledges,
        };
        state.on_update(fighter, &mut env)
    }

    fn apply_step(
        &mut self,
        i: FighterIndex,
        step: Step,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), SimError> {
        match step {
            Step::To(transition) => self.enter_state(i, transition, events),
            Step::Start(kind) => self.start_action(i, kind, events)?,
            Step::ReleaseCharge => {
                self.enter_state(i, Transition::to(StateKind::Action), events);
                self.begin_action(i, events)?;
            }
            Step::Resume(frozen) => self.resume(i, frozen, events),
        }
        Ok(())
    }

    fn enter_state(&mut self, i: FighterIndex, transition: Transition, events: &mut Vec<GameEvent>) {
        let from = self.fighters[i].state;
        if !transition.state.holds_action() {
            self.cancel_action(i, events);
        }

        let fighter = &mut self.fighters[i];
        if from == StateKind::LedgeHang {
            if let Some(ledge) = fighter.vars.ledge.take() {
                self.ledges.release(ledge, i);
            }
            fighter.vars.time_since_ledge = 0;
        }

        self.registry.state(from).on_exit(fighter);
        fighter.state = transition.state;
        fighter.state_progress = 0;
        fighter.vars.vertigo = false;
        fighter.anim.apply(&transition);
        self.registry.state(transition.state).on_enter(fighter);

        debug!(fighter = i, from = %from, to = %transition.state, "state changed");
        events.push(GameEvent::StateChanged {
            fighter: i,
            from,
            to: transition.state,
        });
    }

    /// Return from hitstop without re-entering the state.
    fn resume(&mut self, i: FighterIndex, frozen: FrozenState, events: &mut Vec<GameEvent>) {
        if !frozen.state.holds_action() {
            self.cancel_action(i, events);
        }
        let fighter = &mut self.fighters[i];
        let from = fighter.state;
        fighter.state = frozen.state;
        fighter.state_progress = frozen.progress;
        events.push(GameEvent::StateChanged {
            fighter: i,
            from,
            to: frozen.state,
        });
    }

    // -- actions ------------------------------------------------------------

    fn start_action(
        &mut self,
        i: FighterIndex,
        kind: ActionKind,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), SimError> {
        self.cancel_action(i, events);
        if matches!(
            kind,
            ActionKind::LandLight
                | ActionKind::LandHeavy
                | ActionKind::LandAttack
                | ActionKind::LandTumble
        ) {
            events.push(GameEvent::Landed {
                fighter: i,
                action: kind,
            });
        }

        let script = self.scripts[i]
            .get(&kind)
            .copied()
            .ok_or(SimError::UnknownAction {
                fighter: i,
                action: kind,
            })?;
        self.fighters[i].action = Some(Action::new(kind, script));

        let state = state_for_action(kind);
        self.enter_state(i, Transition::to(state).play(1, kind.name()), events);
        if state != StateKind::Charge {
            self.begin_action(i, events)?;
        }
        Ok(())
    }

    /// Start the pending action and run its first frame.
    fn begin_action(&mut self, i: FighterIndex, events: &mut Vec<GameEvent>) -> Result<(), SimError> {
        if let Some(step) = self.run_action(i, true, events)? {
            self.apply_step(i, step, events)?;
        }
        Ok(())
    }

    /// Tick the fighter's action, returning the transition out of it once it
    /// finishes.
    fn run_action(
        &mut self,
        i: FighterIndex,
        start: bool,
        events: &mut Vec<GameEvent>,
    ) -> Result<Option<Step>, SimError> {
        let Some(mut action) = self.fighters[i].action.take() else {
            return Ok(None);
        };
        let kind = action.kind;
        let def = self.defs[i].action(kind);
        let result = {
            let mut env = self.host.env(i, def, events, self.config.check_desync);
            let started = if start {
                action.start(&mut env)
            } else {
                Ok(())
            };
            match started {
                Ok(()) => action.tick(&mut env),
                Err(e) => {
                    let message = e.to_string();
                    action.status = ActionStatus::RuntimeError;
                    action.error = Some(message.clone());
                    ActionTick::Failed(message)
                }
            }
        };

        match result {
            ActionTick::Continue => {
                self.fighters[i].action = Some(action);
                Ok(None)
            }
            ActionTick::Finished => {
                debug!(fighter = i, action = %kind, frames = action.frame, "action finished");
                events.push(GameEvent::ActionFinished {
                    fighter: i,
                    action: kind,
                    status: action.status,
                });
                Ok(Some(Step::To(end_transition(kind))))
            }
            ActionTick::Failed(message) if self.config.editor_mode => {
                warn!(fighter = i, action = %kind, error = %message, "script error");
                events.push(GameEvent::ScriptError {
                    fighter: i,
                    action: kind,
                    message,
                });
                self.fighters[i].action = Some(action);
                Ok(None)
            }
            ActionTick::Failed(message) => {
                error!(fighter = i, action = %kind, error = %message, "script error");
                Err(SimError::ScriptFailure {
                    fighter: i,
                    action: kind,
                    message,
                })
            }
        }
    }

    fn cancel_action(&mut self, i: FighterIndex, events: &mut Vec<GameEvent>) {
        let Some(mut action) = self.fighters[i].action.take() else {
            return;
        };
        let def = self.defs[i].action(action.kind);
        let mut env = self.host.env(i, def, events, self.config.check_desync);
        action.cancel(&mut env);
        events.push(GameEvent::ActionFinished {
            fighter: i,
            action: action.kind,
            status: action.status,
        });
    }

    // -- collisions ---------------------------------------------------------

    fn pose_volumes(&mut self) {
        let fighters = &self.fighters;
        for (_, hurt) in self.hurt_volumes.iter_mut() {
            let owner = &fighters[hurt.owner];
            hurt.update_shape(&owner.model_matrix(), &owner.bones);
        }
        for (_, hit) in self.host.hit_volumes.iter_mut() {
            let owner = &fighters[hit.owner];
            hit.update_shape(&owner.model_matrix(), &owner.bones);
        }
    }

    fn apply_outcome(&mut self, outcome: &CollisionOutcome, events: &mut Vec<GameEvent>) {
        for clang in &outcome.clangs {
            debug!(
                first = clang.first_owner,
                second = clang.second_owner,
                "clang"
            );
            events.push(GameEvent::Clang {
                first: clang.first_owner,
                second: clang.second_owner,
            });
        }

        // Hits are applied against the poses and volumes from before any of
        // them, so trades resolve the same regardless of order.
        let movers: Vec<(Pose, Vec2)> = self
            .fighters
            .iter()
            .map(|f| (f.pose(), f.vars.velocity))
            .collect();
        let hits: Vec<_> = outcome
            .hits
            .iter()
            .filter_map(|h| self.host.hit_volumes.get(h.hit).map(|v| (*h, v.clone())))
            .collect();
        let grabs: Vec<_> = outcome
            .grabs
            .iter()
            .filter_map(|g| self.host.hit_volumes.get(g.hit).map(|v| (*g, v.key.clone())))
            .collect();

        for (record, volume) in hits {
            let (attacker, victim) = (record.attacker, record.victim);
            let (attacker_pose, attacker_velocity) = movers[attacker];

            if self.fighters[victim].shielding() {
                if let Some(block) = self.fighters[victim].block(&volume.def, attacker_pose) {
                    self.enter_state(victim, Transition::to(StateKind::Freeze), events);
                    if self.fighters[attacker].freeze_for_attack(block.freeze) {
                        self.enter_state(attacker, Transition::to(StateKind::Freeze), events);
                    }
                    debug!(
                        attacker,
                        victim,
                        blob = %volume.key,
                        damage = volume.def.damage,
                        shield = block.shield,
                        stun = block.stun,
                        "blocked"
                    );
                    events.push(GameEvent::Blocked {
                        attacker,
                        victim,
                        blob: volume.key.clone(),
                        damage: volume.def.damage,
                        shield: block.shield,
                    });
                    continue;
                }
                debug!(fighter = victim, "shield broken");
                events.push(GameEvent::ShieldBroken { fighter: victim });
            }

            self.cancel_action(victim, events);
            let knockback =
                self.fighters[victim].take_hit(&volume.def, attacker_pose, attacker_velocity);
            let mut flinch = Transition::to(StateKind::Freeze)
                .play(0, anim::flinch(record.region, knockback.hitstun));
            if knockback.tumbles() {
                flinch = flinch.then(0, anim::TUMBLE_LOOP);
            }
            self.enter_state(victim, flinch, events);

            if self.fighters[attacker].freeze_for_attack(knockback.freeze) {
                self.enter_state(attacker, Transition::to(StateKind::Freeze), events);
            }

            debug!(
                attacker,
                victim,
                blob = %volume.key,
                damage = volume.def.damage,
                knockback = knockback.knockback,
                freeze = knockback.freeze,
                hitstun = knockback.hitstun,
                launch_speed = knockback.launch_speed,
                region = ?record.region,
                "hit"
            );
            events.push(GameEvent::Hit {
                attacker,
                victim,
                action: volume.action,
                blob: volume.key.clone(),
                damage: volume.def.damage,
                knockback: knockback.knockback,
                region: record.region,
                handler: volume.def.handler.clone(),
            });
            if let Some(key) = volume.def.sound.clone() {
                events.push(GameEvent::PlaySound {
                    fighter: attacker,
                    key,
                });
            }
        }

        for (record, blob) in grabs {
            self.apply_grab(record.grabber, record.victim, blob, events);
        }

        for i in 0..self.fighters.len() {
            let damage = outcome.rebound[i];
            if damage <= 0.0 {
                continue;
            }
            self.cancel_action(i, events);
            let stun = self.fighters[i].rebound(damage);
            self.enter_state(
                i,
                Transition::to(StateKind::Freeze).play(0, anim::REBOUND),
                events,
            );
            debug!(fighter = i, damage, stun, "rebound");
            events.push(GameEvent::Rebound { fighter: i, stun });
        }
    }

    fn apply_grab(
        &mut self,
        grabber: FighterIndex,
        victim: FighterIndex,
        blob: String,
        events: &mut Vec<GameEvent>,
    ) {
        self.cancel_action(grabber, events);
        self.cancel_action(victim, events);

        let g = &mut self.fighters[grabber];
        g.vars.holding = Some(victim);
        g.vars.velocity = Vec2::ZERO;
        g.vars.launch_speed = 0.0;
        g.frozen = None;
        let (position, facing) = (g.vars.position, g.vars.facing);

        let v = &mut self.fighters[victim];
        v.vars.held_by = Some(grabber);
        v.vars.grab_time = grab_hold_time(v.vars.damage);
        v.vars.position.x = position.x + f32::from(facing) * GRAB_HOLD_DISTANCE;
        v.vars.velocity = Vec2::ZERO;
        v.vars.launch_speed = 0.0;
        v.vars.facing = -facing;
        v.frozen = None;
        let hold = v.vars.grab_time;

        self.enter_state(
            grabber,
            Transition::to(StateKind::Grabbing).play(1, anim::GRAB_HOLD),
            events,
        );
        self.enter_state(
            victim,
            Transition::to(StateKind::Held).play(1, anim::HELD_LOOP),
            events,
        );
        debug!(grabber, victim, blob = %blob, hold, "grab");
        events.push(GameEvent::Grabbed {
            grabber,
            victim,
            blob,
        });
    }

    /// Release grabs where either side has left its grab state.
    fn sync_grabs(&mut self, events: &mut Vec<GameEvent>) {
        for grabber in 0..self.fighters.len() {
            let Some(victim) = self.fighters[grabber].vars.holding else {
                continue;
            };
            let held = &self.fighters[victim];
            let intact = self.fighters[grabber].state == StateKind::Grabbing
                && held.state == StateKind::Held
                && held.vars.held_by == Some(grabber);
            if !intact {
                self.release_grab(grabber, victim, events);
            }
        }
        for victim in 0..self.fighters.len() {
            let Some(grabber) = self.fighters[victim].vars.held_by else {
                continue;
            };
            if self.fighters[grabber].vars.holding != Some(victim) {
                self.release_grab(grabber, victim, events);
            }
        }
    }

    fn release_grab(&mut self, grabber: FighterIndex, victim: FighterIndex, events: &mut Vec<GameEvent>) {
        if self.fighters[grabber].vars.holding == Some(victim) {
            self.fighters[grabber].vars.holding = None;
        }
        if self.fighters[victim].vars.held_by == Some(grabber) {
            self.fighters[victim].vars.held_by = None;
        }
        for (i, kind) in [(grabber, StateKind::Grabbing), (victim, StateKind::Held)] {
            if self.fighters[i].state == kind {
                let to = let_go(&mut self.fighters[i]);
                self.enter_state(i, to, events);
            }
        }
        debug!(grabber, victim, "grab released");
        events.push(GameEvent::GrabReleased { grabber, victim });
    }

    fn knock_out(&mut self, i: FighterIndex, events: &mut Vec<GameEvent>) {
        self.cancel_action(i, events);
        self.ledges.release_all(i);
        self.fighters[i].respawn();
        self.enter_state(
            i,
            Transition::to(StateKind::Neutral).play(0, anim::NEUTRAL_LOOP),
            events,
        );
        debug!(fighter = i, "knocked out");
        events.push(GameEvent::KnockedOut { fighter: i });
    }

    // -- editor -------------------------------------------------------------

    /// Freeze `fighter` in the editor preview state, cancelling its action.
    pub fn enter_preview(&mut self, fighter: FighterIndex) -> Result<Vec<GameEvent>, SimError> {
        self.check_fighter(fighter)?;
        let mut events = Vec::new();
        self.enter_state(fighter, Transition::to(StateKind::EditorPreview), &mut events);
        Ok(events)
    }

    /// Start `kind` on `fighter` right away, whatever state it is in.
    pub fn play_action(
        &mut self,
        fighter: FighterIndex,
        kind: ActionKind,
    ) -> Result<Vec<GameEvent>, SimError> {
        self.check_fighter(fighter)?;
        let mut events = Vec::new();
        self.start_action(fighter, kind, &mut events)?;
        Ok(events)
    }

    /// Replace one action definition and recompile its script.
    ///
    /// Returns `false` when `def` has no changes. A running instance of the
    /// action keeps its old script until it is started again.
    pub fn update_action_def(
        &mut self,
        fighter: FighterIndex,
        kind: ActionKind,
        def: ActionDef,
    ) -> Result<bool, SimError> {
        self.check_fighter(fighter)?;
        let fighter_def = &self.defs[fighter];
        if fighter_def
            .action(kind)
            .is_some_and(|current| !current.has_changes(&def))
        {
            return Ok(false);
        }
        def.validate(&format!("{}/{}", fighter_def.name, kind.name()))?;

        let source = script_source(kind, Some(&def), fighter_def);
        let name = script_name(fighter, fighter_def, kind);
        let script = self.host.runtime.compile(&name, &source)?;
        self.scripts[fighter].insert(kind, script);
        self.defs[fighter]
            .actions
            .insert(kind.name().to_owned(), def);
        debug!(fighter, action = %kind, "action definition replaced");
        Ok(true)
    }

    // -- presentation -------------------------------------------------------

    /// Bone matrices for `fighter`, supplied by the animation layer.
    pub fn set_bone_matrices(
        &mut self,
        fighter: FighterIndex,
        bones: Vec<Affine3A>,
    ) -> Result<(), SimError> {
        self.check_fighter(fighter)?;
        self.fighters[fighter].bones = bones;
        Ok(())
    }

    /// Root-motion offset applied by `fighter`'s next move.
    pub fn set_root_motion(
        &mut self,
        fighter: FighterIndex,
        translate: Vec2,
    ) -> Result<(), SimError> {
        self.check_fighter(fighter)?;
        self.fighters[fighter].vars.translate = self.fighters[fighter].vars.translate + translate;
        Ok(())
    }

    /// `fighter`'s pose blended `blend` of the way from the previous tick to
    /// the current one.
    pub fn interpolate(&self, fighter: FighterIndex, blend: f32) -> Result<Pose, SimError> {
        Ok(self.fighter(fighter)?.interpolate(blend))
    }

    // -- accessors ----------------------------------------------------------

    /// The number of ticks executed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// The current simulation time in seconds.
    ///
    /// Computed as `tick_count * fixed_dt` to avoid floating-point drift from
    /// repeated addition.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.fixed_dt()
    }

    /// The fixed time step in seconds per tick.
    pub fn fixed_dt(&self) -> f64 {
        self.config.fixed_dt()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn fighters(&self) -> &[Fighter] {
        &self.fighters
    }

    pub fn fighter(&self, fighter: FighterIndex) -> Result<&Fighter, SimError> {
        self.fighters
            .get(fighter)
            .ok_or(SimError::UnknownFighter(fighter))
    }

    pub fn fighter_def(&self, fighter: FighterIndex) -> Result<&FighterDef, SimError> {
        self.defs
            .get(fighter)
            .ok_or(SimError::UnknownFighter(fighter))
    }

    pub fn hit_volumes(&self) -> &VolumeArena<HitVolume> {
        &self.host.hit_volumes
    }

    pub fn hurt_volumes(&self) -> &VolumeArena<HurtVolume> {
        &self.hurt_volumes
    }

    pub fn hit_bits(&self) -> &HitBits {
        &self.host.hit_bits
    }

    pub fn ledges(&self) -> &LedgeClaims {
        &self.ledges
    }

    /// Diagnostics from the last tick (timing per fighter).
    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    /// Set the input for the next and every following tick.
    pub fn set_input(&mut self, input: TickInput) {
        self.current_input = input;
    }

    /// Replace one fighter's input sample.
    pub fn set_sample(
        &mut self,
        fighter: FighterIndex,
        sample: InputSample,
    ) -> Result<(), SimError> {
        self.check_fighter(fighter)?;
        self.current_input.set(fighter, sample);
        Ok(())
    }

    pub fn current_input(&self) -> &TickInput {
        &self.current_input
    }

    /// Whether headless mode is enabled.
    pub fn is_headless(&self) -> bool {
        self.config.headless
    }

    fn check_fighter(&self, fighter: FighterIndex) -> Result<(), SimError> {
        self.fighter(fighter).map(|_| ())
    }

    // -- snapshot support ---------------------------------------------------

    pub(crate) fn runtime(&self) -> &dyn ScriptRuntime {
        self.host.runtime.as_ref()
    }

    pub(crate) fn rng(&self) -> &Pcg32 {
        &self.rng
    }

    /// Overwrite every piece of mutable state at once.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore_parts(
        &mut self,
        fighters: Vec<Fighter>,
        hit_volumes: VolumeArena<HitVolume>,
        hurt_volumes: VolumeArena<HurtVolume>,
        hit_bits: HitBits,
        ledges: LedgeClaims,
        rng: Pcg32,
        tick_counter: u64,
        current_input: TickInput,
        tasks: &serde_json::Value,
    ) -> Result<(), ScriptError> {
        self.host.runtime.restore_tasks(tasks)?;
        self.fighters = fighters;
        self.host.hit_volumes = hit_volumes;
        self.hurt_volumes = hurt_volumes;
        self.host.hit_bits = hit_bits;
        self.ledges = ledges;
        self.rng = rng;
        self.tick_counter = tick_counter;
        self.current_input = current_input;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Script source for `kind`: the definition's own, or a fallback when it has
/// none.
fn script_source(kind: ActionKind, def: Option<&ActionDef>, fighter: &FighterDef) -> String {
    match def {
        Some(def) if !def.script.trim().is_empty() => def.script.clone(),
        _ => fallback_script(kind, &fighter.attributes),
    }
}

/// Runtime key of a fighter's action script. Fighters sharing a definition
/// still get their own programs.
fn script_name(fighter: FighterIndex, def: &FighterDef, kind: ActionKind) -> String {
    format!("{fighter}:{}/{}", def.name, kind.name())
}

fn compile_scripts(
    runtime: &mut dyn ScriptRuntime,
    fighter: FighterIndex,
    def: &FighterDef,
) -> Result<BTreeMap<ActionKind, ScriptId>, SimError> {
    let mut scripts = BTreeMap::new();
    for kind in ActionKind::ALL {
        let source = script_source(kind, def.action(kind), def);
        let name = script_name(fighter, def, kind);
        scripts.insert(kind, runtime.compile(&name, &source)?);
    }
    Ok(scripts)
}

/// Shake offset for a flinching fighter; stronger for longer hitstop.
fn jitter(rng: &mut Pcg32, freeze_time: u32) -> Vec2 {
    let strength = freeze_time as f32 * 0.125 / 32.0 + 0.0625;
    Vec2::new(
        rng.gen_range(-strength..=strength),
        rng.gen_range(-strength..=strength),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
