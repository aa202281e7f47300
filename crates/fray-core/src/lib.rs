//! Fray Core -- leaf data model for the deterministic fighting-game core.
//!
//! This crate holds everything the simulation needs that does not depend on
//! fighters or stages: capsule tests over `glam` vectors, the generation-checked
//! [`VolumeArena`](arena::VolumeArena) that stores collision volumes, volume
//! definitions, input discretisation, the buffered [`Command`](command::Command)
//! history and per-fighter [`Attributes`](attributes::Attributes).
//!
//! # Quick Start
//!
//! ```
//! use fray_core::prelude::*;
//!
//! let mut arena = VolumeArena::with_capacity(16);
//! let def = HitVolumeDef { radius: 0.5, damage: 10.0, ..Default::default() };
//! let id = arena.insert(HitVolume::new("jab", 0, ActionKind::NeutralFirst, def));
//!
//! let model = model_matrix(Vec2::new(1.0, 0.0), 1);
//! arena.get_mut(id).unwrap().update_shape(&model, &[]);
//! assert!(arena.get(id).unwrap().posed);
//! ```

#![deny(unsafe_code)]

pub mod action;
pub mod arena;
pub mod attributes;
pub mod command;
pub mod input;
pub mod math;
pub mod volume;

/// Index of a fighter within a match, in spawn order.
pub type FighterIndex = usize;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by core data conversions.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A string did not name a known action.
    #[error("unknown action '{name}'")]
    UnknownAction { name: String },

    /// A raw input sample could not be discretised.
    #[error("invalid input sample: {details}")]
    InvalidInput { details: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::action::{ActionKind, ActionStatus};
    pub use crate::arena::{VolumeArena, VolumeId};
    pub use crate::attributes::Attributes;
    pub use crate::command::{Command, CommandBuffer};
    pub use crate::input::{Controller, InputFrame, InputSample};
    pub use crate::math::{model_matrix, Affine3A, Capsule, Vec2, Vec3};
    pub use crate::volume::{
        AngleMode, BlobKind, ClangMode, FacingMode, Flavour, HitVolume, HitVolumeDef, HurtVolume,
        HurtVolumeDef, Region,
    };
    pub use crate::{CoreError, FighterIndex};
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
