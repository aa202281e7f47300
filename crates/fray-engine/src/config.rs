//! Match-wide settings passed to the tick driver.

use fray_core::attributes::{CLANG_THRESHOLD, DEFAULT_TICK_RATE, KNOCKBACK_DECAY};
use serde::{Deserialize, Serialize};

use crate::SimError;

/// Configuration for one match.
///
/// Everything that used to be a global flag (editor mode, desync checks,
/// headless rendering) lives here and is handed to
/// [`Simulation::new`](crate::tick::Simulation::new).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Ticks per second. Must be positive.
    pub tick_rate: u32,
    /// Script runtime errors end the action instead of the match.
    pub editor_mode: bool,
    /// Damage difference below which two hit volumes clang.
    pub clang_threshold: f32,
    /// Per-tick launch speed decay.
    pub knockback_decay: f32,
    /// Frames of command history kept per fighter.
    pub command_buffer_depth: usize,
    /// Capacity of the hit volume arena and of the hurt volume arena.
    pub volume_capacity: usize,
    /// Operations a script may run in one resume.
    pub script_op_budget: u32,
    /// Compare the core's action frame against the frame the script reports.
    pub check_desync: bool,
    /// No presentation layer is attached.
    pub headless: bool,
    /// Seed for the presentation jitter generator.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            editor_mode: false,
            clang_threshold: CLANG_THRESHOLD,
            knockback_decay: KNOCKBACK_DECAY,
            command_buffer_depth: 8,
            volume_capacity: 256,
            script_op_budget: 1024,
            check_desync: cfg!(debug_assertions),
            headless: true,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    /// Seconds per tick.
    pub fn fixed_dt(&self) -> f64 {
        1.0 / f64::from(self.tick_rate)
    }

    /// Reject settings no match can run with.
    pub fn validate(&self) -> Result<(), SimError> {
        let invalid = |field: &'static str, reason: &str| {
            Err(SimError::Config {
                field,
                reason: reason.to_owned(),
            })
        };
        if self.tick_rate == 0 {
            return invalid("tick_rate", "must be positive");
        }
        if self.command_buffer_depth == 0 {
            return invalid("command_buffer_depth", "must hold at least one frame");
        }
        if self.volume_capacity == 0 {
            return invalid("volume_capacity", "must hold at least one volume");
        }
        if self.script_op_budget == 0 {
            return invalid("script_op_budget", "must allow at least one operation");
        }
        if !self.clang_threshold.is_finite() || self.clang_threshold < 0.0 {
            return invalid("clang_threshold", "must be finite and not negative");
        }
        if !self.knockback_decay.is_finite() || self.knockback_decay < 0.0 {
            return invalid("knockback_decay", "must be finite and not negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_gameplay_constants() {
        let config = SimulationConfig::default();
        assert_eq!(config.tick_rate, 48);
        assert_eq!(config.clang_threshold, 9.0);
        assert_eq!(config.knockback_decay, 0.0051);
        assert_eq!(config.command_buffer_depth, 8);
        assert!(config.headless);
        assert!(!config.editor_mode);
    }

    #[test]
    fn fixed_dt_from_tick_rate() {
        let config = SimulationConfig {
            tick_rate: 50,
            ..Default::default()
        };
        assert!((config.fixed_dt() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_sizes_rejected() {
        let field_of = |config: SimulationConfig| match config.validate() {
            Err(SimError::Config { field, .. }) => field,
            other => panic!("expected a config error, got {other:?}"),
        };
        let zero_depth = SimulationConfig {
            command_buffer_depth: 0,
            ..Default::default()
        };
        let zero_capacity = SimulationConfig {
            volume_capacity: 0,
            ..Default::default()
        };
        let zero_rate = SimulationConfig {
            tick_rate: 0,
            ..Default::default()
        };
        assert_eq!(field_of(zero_depth), "command_buffer_depth");
        assert_eq!(field_of(zero_capacity), "volume_capacity");
        assert_eq!(field_of(zero_rate), "tick_rate");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{ "editor_mode": true, "seed": 7 }"#).unwrap();
        assert!(config.editor_mode);
        assert_eq!(config.seed, 7);
        assert_eq!(config.volume_capacity, 256);
    }
}
