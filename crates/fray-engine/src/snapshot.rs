//! Simulation snapshot and restore with BLAKE3 hashing.
//!
//! Provides [`SimSnapshot`] -- a serializable representation of every piece
//! of mutable match state (fighters, live volumes, hit bits, ledge claims,
//! jitter generator, script tasks, tick counter and input) with a BLAKE3
//! content hash for integrity verification and determinism testing.
//!
//! # Usage
//!
//! ```
//! use fray_engine::prelude::*;
//!
//! let defs = vec![FighterDef::default(), FighterDef::default()];
//! let mut sim = Simulation::new(SimulationConfig::default(), FlatStage::default(), defs).unwrap();
//! sim.run_ticks(10).unwrap();
//!
//! let snapshot = sim.capture_snapshot();
//! assert_eq!(snapshot.tick_counter, 10);
//! assert_eq!(snapshot.hash.len(), 64); // BLAKE3 hex digest
//!
//! sim.run_ticks(10).unwrap();
//! sim.restore_from_snapshot(&snapshot).unwrap();
//! assert_eq!(sim.tick_count(), 10);
//! assert_eq!(sim.state_hash(), snapshot.hash);
//! ```
//!
//! # What Is NOT Serialized
//!
//! - **Definitions and compiled scripts** -- fixed for the whole match. A
//!   snapshot restores into a simulation built from the same definitions.
//! - **Stage** -- immutable terrain; ledge ownership is part of the snapshot.
//! - **Diagnostics** -- per-tick timing is transient and not snapshotted.

use fray_core::arena::VolumeArena;
use fray_core::volume::{HitVolume, HurtVolume};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::collision::HitBits;
use crate::fighter::Fighter;
use crate::stage::LedgeClaims;
use crate::tick::{Simulation, TickInput};

// ---------------------------------------------------------------------------
// SimSnapshot
// ---------------------------------------------------------------------------

/// A serializable snapshot of the full simulation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub fighters: Vec<Fighter>,
    pub hit_volumes: VolumeArena<HitVolume>,
    pub hurt_volumes: VolumeArena<HurtVolume>,
    pub hit_bits: HitBits,
    pub ledges: LedgeClaims,
    /// Jitter generator state.
    pub rng: Pcg32,
    /// Number of ticks executed at the time of capture.
    pub tick_counter: u64,
    pub tick_rate: u32,
    /// Script runtime task state, as saved by the runtime.
    pub tasks: serde_json::Value,
    pub current_input: TickInput,
    /// BLAKE3 hex digest (64 lowercase hex chars) of everything above.
    pub hash: String,
}

// ---------------------------------------------------------------------------
// Hashing helpers
// ---------------------------------------------------------------------------

/// Borrowed view of the hashed state, so capture and verification serialize
/// the same fields in the same order.
#[derive(Serialize)]
struct HashableState<'a> {
    fighters: &'a [Fighter],
    hit_volumes: &'a VolumeArena<HitVolume>,
    hurt_volumes: &'a VolumeArena<HurtVolume>,
    hit_bits: &'a HitBits,
    ledges: &'a LedgeClaims,
    rng: &'a Pcg32,
    tick_counter: u64,
    tick_rate: u32,
    tasks: &'a serde_json::Value,
    current_input: &'a TickInput,
}

impl HashableState<'_> {
    fn hash(&self) -> String {
        let json_bytes = serde_json::to_vec(self)
            .expect("simulation state should always be JSON-serializable");
        blake3::hash(&json_bytes).to_hex().to_string()
    }
}

impl SimSnapshot {
    fn hashable(&self) -> HashableState<'_> {
        HashableState {
            fighters: &self.fighters,
            hit_volumes: &self.hit_volumes,
            hurt_volumes: &self.hurt_volumes,
            hit_bits: &self.hit_bits,
            ledges: &self.ledges,
            rng: &self.rng,
            tick_counter: self.tick_counter,
            tick_rate: self.tick_rate,
            tasks: &self.tasks,
            current_input: &self.current_input,
        }
    }

    /// Recompute the hash from the snapshot's data.
    pub fn recompute_hash(&self) -> String {
        self.hashable().hash()
    }
}

// ---------------------------------------------------------------------------
// Simulation snapshot/restore methods
// ---------------------------------------------------------------------------

impl Simulation {
    /// Capture a complete snapshot of the simulation state.
    pub fn capture_snapshot(&self) -> SimSnapshot {
        let mut snapshot = SimSnapshot {
            fighters: self.fighters().to_vec(),
            hit_volumes: self.hit_volumes().clone(),
            hurt_volumes: self.hurt_volumes().clone(),
            hit_bits: self.hit_bits().clone(),
            ledges: self.ledges().clone(),
            rng: self.rng().clone(),
            tick_counter: self.tick_count(),
            tick_rate: self.config().tick_rate,
            tasks: self.runtime().save_tasks(),
            current_input: self.current_input().clone(),
            hash: String::new(),
        };
        snapshot.hash = snapshot.recompute_hash();
        snapshot
    }

    /// Restore the simulation state from a previously captured snapshot.
    ///
    /// The snapshot is checked before anything is touched: it must come from
    /// a match with the same fighter count and tick rate, and its recorded
    /// hash must match its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot does not fit this simulation, if its
    /// hash is invalid (corruption/tampering) or if the script runtime
    /// rejects the saved task state.
    pub fn restore_from_snapshot(&mut self, snapshot: &SimSnapshot) -> Result<(), anyhow::Error> {
        if snapshot.fighters.len() != self.fighters().len() {
            return Err(crate::SimError::Snapshot(format!(
                "snapshot has {} fighters, simulation has {}",
                snapshot.fighters.len(),
                self.fighters().len()
            ))
            .into());
        }
        if snapshot.tick_rate != self.config().tick_rate {
            return Err(crate::SimError::Snapshot(format!(
                "snapshot runs at {} ticks per second, simulation at {}",
                snapshot.tick_rate,
                self.config().tick_rate
            ))
            .into());
        }

        let expected_hash = snapshot.recompute_hash();
        if expected_hash != snapshot.hash {
            return Err(anyhow::anyhow!(
                "snapshot hash mismatch: recorded {} but recomputed {}. \
                 The snapshot may be corrupted or tampered with.",
                snapshot.hash,
                expected_hash
            ));
        }

        self.restore_parts(
            snapshot.fighters.clone(),
            snapshot.hit_volumes.clone(),
            snapshot.hurt_volumes.clone(),
            snapshot.hit_bits.clone(),
            snapshot.ledges.clone(),
            snapshot.rng.clone(),
            snapshot.tick_counter,
            snapshot.current_input.clone(),
            &snapshot.tasks,
        )
        .map_err(|e| anyhow::anyhow!("failed to restore script tasks from snapshot: {e}"))?;

        tracing::debug!(tick = snapshot.tick_counter, "simulation restored from snapshot");
        Ok(())
    }

    /// Compute the BLAKE3 state hash.
    ///
    /// Equivalent to `capture_snapshot().hash`, without cloning the state.
    pub fn state_hash(&self) -> String {
        let tasks = self.runtime().save_tasks();
        HashableState {
            fighters: self.fighters(),
            hit_volumes: self.hit_volumes(),
            hurt_volumes: self.hurt_volumes(),
            hit_bits: self.hit_bits(),
            ledges: self.ledges(),
            rng: self.rng(),
            tick_counter: self.tick_count(),
            tick_rate: self.config().tick_rate,
            tasks: &tasks,
            current_input: self.current_input(),
        }
        .hash()
    }

    /// Fork the current simulation state for branching scenarios.
    ///
    /// Identical to [`capture_snapshot`](Self::capture_snapshot); the name
    /// marks a divergence point rather than a save point.
    pub fn fork_snapshot(&self) -> SimSnapshot {
        self.capture_snapshot()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
