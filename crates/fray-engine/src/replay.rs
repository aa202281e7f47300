//! Deterministic replay with input recording and checkpoint verification.
//!
//! The replay system records each tick's [`TickInput`] and periodic state
//! hash checkpoints during a match, producing a [`ReplayLog`]. The log can
//! then be replayed against a [`Simulation`] built from the same fighter
//! definitions: the replay restores the initial snapshot, feeds the recorded
//! inputs tick by tick and compares state hashes at each checkpoint.
//!
//! # Recording and replaying
//!
//! ```
//! use fray_engine::prelude::*;
//!
//! let defs = vec![FighterDef::default(), FighterDef::default()];
//! let mut sim = Simulation::new(SimulationConfig::default(), FlatStage::default(), defs).unwrap();
//!
//! let mut recorder = ReplayRecorder::new(sim.capture_snapshot(), 10);
//! for tick in 0..60u64 {
//!     let axis_x = if tick < 30 { 1.0 } else { 0.0 };
//!     sim.set_sample(0, InputSample { axis_x, ..Default::default() }).unwrap();
//!     recorder.record_tick(sim.tick_count(), sim.current_input(), Some(sim.state_hash()));
//!     sim.tick().unwrap();
//! }
//! let log = recorder.finish();
//!
//! let result = replay(&mut sim, &log).unwrap();
//! assert!(result.completed);
//! assert!(result.first_divergence.is_none());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::snapshot::SimSnapshot;
use crate::tick::{Simulation, TickInput};

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// A complete replay log: initial snapshot + ordered sequence of inputs and
/// checkpoints.
///
/// The log is fully serializable to JSON for storage or regression fixtures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayLog {
    /// The simulation snapshot captured at the start of recording.
    pub initial_snapshot: SimSnapshot,

    /// Combined content hash of the fighter definitions used while
    /// recording. Informational; [`replay`] does not enforce it.
    pub defs_hash: Option<String>,

    /// Total number of ticks recorded. Replay executes exactly this many
    /// ticks from the initial snapshot.
    pub total_ticks: u64,

    /// Ordered sequence of replay entries (inputs and checkpoints).
    pub entries: Vec<ReplayEntry>,
}

// ---------------------------------------------------------------------------
// ReplayEntry
// ---------------------------------------------------------------------------

/// A single entry in a [`ReplayLog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplayEntry {
    /// Input active at `tick`. Ticks without an entry are idle.
    Input { tick: u64, input: TickInput },
    /// State hash taken at `tick`, after its input was set and before it ran.
    Checkpoint { tick: u64, state_hash: String },
}

// ---------------------------------------------------------------------------
// ReplayResult
// ---------------------------------------------------------------------------

/// The outcome of replaying a [`ReplayLog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Every recorded tick ran and every checkpoint matched.
    pub completed: bool,
    pub ticks_replayed: u64,
    /// The first checkpoint whose hash did not match. `None` if the replay
    /// was deterministic.
    pub first_divergence: Option<ReplayDivergence>,
}

/// Details about a determinism failure detected during replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub tick: u64,
    pub expected_hash: String,
    pub actual_hash: String,
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Records a match into a [`ReplayLog`].
///
/// Call [`record_tick`](Self::record_tick) before each tick, then
/// [`finish`](Self::finish) to produce the log. Ticks must be recorded in
/// strictly increasing order.
pub struct ReplayRecorder {
    log: ReplayLog,
    /// How often (in ticks) to record a checkpoint; 0 records one for every
    /// supplied hash.
    checkpoint_interval: u64,
    ticks_recorded: u64,
    last_tick: Option<u64>,
}

impl ReplayRecorder {
    pub fn new(snapshot: SimSnapshot, checkpoint_interval: u64) -> Self {
        Self {
            log: ReplayLog {
                initial_snapshot: snapshot,
                defs_hash: None,
                total_ticks: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
            ticks_recorded: 0,
            last_tick: None,
        }
    }

    /// Record the combined definition hash for `sim`'s fighters.
    pub fn set_defs_hash(&mut self, sim: &Simulation) {
        let mut hasher = blake3::Hasher::new();
        for i in 0..sim.fighters().len() {
            if let Ok(def) = sim.fighter_def(i) {
                hasher.update(def.content_hash().as_bytes());
            }
        }
        self.log.defs_hash = Some(hasher.finalize().to_hex().to_string());
    }

    /// Record a single tick, before it runs.
    ///
    /// Non-idle inputs are always recorded. A checkpoint is recorded when
    /// `state_hash` is supplied and `tick` falls on the checkpoint interval.
    ///
    /// # Panics
    ///
    /// Panics if `tick` is not strictly greater than the previous one.
    pub fn record_tick(&mut self, tick: u64, input: &TickInput, state_hash: Option<String>) {
        if let Some(prev) = self.last_tick {
            assert!(
                tick > prev,
                "ReplayRecorder::record_tick: tick {tick} is not strictly greater than previous tick {prev}"
            );
        }
        self.last_tick = Some(tick);
        self.ticks_recorded += 1;

        if !input.is_empty() {
            self.log.entries.push(ReplayEntry::Input {
                tick,
                input: input.clone(),
            });
        }

        if let Some(hash) = state_hash {
            let should_checkpoint =
                self.checkpoint_interval == 0 || tick % self.checkpoint_interval == 0;
            if should_checkpoint {
                self.log.entries.push(ReplayEntry::Checkpoint {
                    tick,
                    state_hash: hash,
                });
            }
        }
    }

    pub fn finish(mut self) -> ReplayLog {
        self.log.total_ticks = self.ticks_recorded;
        self.log
    }
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

/// Replay a [`ReplayLog`] against `sim`, verifying determinism at each
/// checkpoint.
///
/// The log is validated (no duplicate entries, no tick overflow) before the
/// simulation is touched. The initial snapshot is then restored and each
/// tick's recorded input (or idle input) is set, its checkpoint compared,
/// and the tick run. Replay stops at the first divergence.
///
/// # Errors
///
/// Returns an error if the log is malformed, if the initial snapshot cannot
/// be restored, or if a tick fails (a script error outside editor mode).
pub fn replay(sim: &mut Simulation, log: &ReplayLog) -> Result<ReplayResult, anyhow::Error> {
    let mut inputs: BTreeMap<u64, &TickInput> = BTreeMap::new();
    let mut checkpoints: BTreeMap<u64, &str> = BTreeMap::new();

    for entry in &log.entries {
        match entry {
            ReplayEntry::Input { tick, input } => {
                if inputs.insert(*tick, input).is_some() {
                    return Err(anyhow::anyhow!(
                        "replay log contains duplicate Input entry at tick {tick}"
                    ));
                }
            }
            ReplayEntry::Checkpoint { tick, state_hash } => {
                if checkpoints.insert(*tick, state_hash).is_some() {
                    return Err(anyhow::anyhow!(
                        "replay log contains duplicate Checkpoint entry at tick {tick}"
                    ));
                }
            }
        }
    }

    let start_tick = log.initial_snapshot.tick_counter;
    let total_ticks = log.total_ticks;
    if total_ticks == 0 {
        return Ok(ReplayResult {
            completed: true,
            ticks_replayed: 0,
            first_divergence: None,
        });
    }

    // Exclusive end: ticks [start_tick, start_tick + total_ticks).
    let end_tick = start_tick.checked_add(total_ticks).ok_or_else(|| {
        anyhow::anyhow!(
            "tick range overflow: start_tick ({start_tick}) + total_ticks ({total_ticks}) exceeds u64::MAX"
        )
    })?;

    sim.restore_from_snapshot(&log.initial_snapshot)
        .map_err(|e| anyhow::anyhow!("failed to restore initial snapshot for replay: {e}"))?;

    let mut ticks_replayed = 0;
    for tick in start_tick..end_tick {
        // The recorded hash covers the input, so set it first.
        let input = inputs.get(&tick).map(|i| (*i).clone()).unwrap_or_default();
        sim.set_input(input);

        if let Some(expected_hash) = checkpoints.get(&tick) {
            let actual_hash = sim.state_hash();
            if actual_hash != *expected_hash {
                tracing::warn!(tick, expected = %expected_hash, actual = %actual_hash, "replay diverged");
                return Ok(ReplayResult {
                    completed: false,
                    ticks_replayed,
                    first_divergence: Some(ReplayDivergence {
                        tick,
                        expected_hash: (*expected_hash).to_owned(),
                        actual_hash,
                    }),
                });
            }
        }

        sim.tick()?;
        ticks_replayed += 1;
    }

    Ok(ReplayResult {
        completed: true,
        ticks_replayed,
        first_divergence: None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
