//! Fray Defs -- persisted fighter and action definitions.
//!
//! Definitions are plain JSON documents authored by the editor. This crate
//! loads and saves them, validates them before the simulation sees them, and
//! gives the editor the round-trip helpers it needs for undo and "modified"
//! tracking.
//!
//! # Modules
//!
//! - [`action_def`]: [`ActionDef`](action_def::ActionDef) -- hit blobs,
//!   visual effects, particle emitters and timeline script of one action.
//! - [`fighter_def`]: [`FighterDef`](fighter_def::FighterDef) -- attributes,
//!   hurt blobs and the action table of one fighter.
//!
//! # Example
//!
//! ```
//! use fray_defs::prelude::*;
//!
//! let json = r#"{
//!     "blobs": { "fist": { "radius": 0.4, "damage": 8.0, "group": 0 } },
//!     "script": "wait_until 3\nenable_hitblobs \"fist\"\nwait_for 2\ndisable_hitblobs"
//! }"#;
//! let def = ActionDef::from_json_str(json).unwrap();
//! def.validate("jab").unwrap();
//! assert_eq!(def.content_hash().len(), 64);
//! assert!(!def.has_changes(&def.clone()));
//! ```

#![deny(unsafe_code)]

pub mod action_def;
pub mod fighter_def;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while loading or validating definitions.
#[derive(Debug, thiserror::Error)]
pub enum DefsError {
    /// The document could not be parsed.
    #[error("failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing a definition file failed.
    #[error("io error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A field holds a value the simulation cannot use.
    #[error("invalid definition '{owner}.{key}': {reason}")]
    Invalid {
        owner: String,
        key: String,
        reason: String,
    },

    /// An action table key does not name a known action.
    #[error("fighter '{fighter}' defines unknown action '{name}'")]
    UnknownAction { fighter: String, name: String },
}

/// Compute the BLAKE3 hex digest of any serialisable definition.
pub(crate) fn hash_json<T: serde::Serialize>(value: &T) -> String {
    let bytes =
        serde_json::to_vec(value).expect("definitions should always be JSON-serializable");
    blake3::hash(&bytes).to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::action_def::{ActionDef, EffectDef, EmitterDef, RandomRange};
    pub use crate::fighter_def::FighterDef;
    pub use crate::DefsError;
}
