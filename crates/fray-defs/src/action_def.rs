//! Editable data of a single action.
//!
//! An [`ActionDef`] is everything the editor can change about one action:
//! its hit blobs, visual effects, particle emitters and timeline script
//! source. Each collection is keyed by a short string id and stored in a
//! `BTreeMap`, so iteration order (and therefore the JSON form and the
//! content hash) is deterministic.
//!
//! # Editor round-trip
//!
//! The editor keeps an undo stack of cloned `ActionDef`s. [`ActionDef::has_changes`]
//! compares the editable fields and [`ActionDef::apply_changes`] copies them
//! back, which is all undo/redo and "modified" tracking need.

use std::collections::BTreeMap;
use std::path::Path;

use fray_core::math::Vec3;
use fray_core::volume::{HitVolumeDef, MAX_GROUPS};
use serde::{Deserialize, Serialize};

use crate::DefsError;

// ---------------------------------------------------------------------------
// RandomRange
// ---------------------------------------------------------------------------

/// Inclusive range a particle property is drawn from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RandomRange<T> {
    pub min: T,
    pub max: T,
}

// ---------------------------------------------------------------------------
// EffectDef
// ---------------------------------------------------------------------------

/// A visual effect an action can play by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectDef {
    /// Asset path of the effect.
    pub path: String,
    pub origin: Vec3,
    /// Quaternion `[x, y, z, w]`.
    pub rotation: [f32; 4],
    pub scale: Vec3,
    pub bone: Option<u8>,
    /// Follow the fighter after spawning.
    pub anchored: bool,
}

impl Default for EffectDef {
    fn default() -> Self {
        Self {
            path: String::new(),
            origin: Vec3::ZERO,
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: Vec3::new(1.0, 1.0, 1.0),
            bone: None,
            anchored: false,
        }
    }
}

// ---------------------------------------------------------------------------
// EmitterDef
// ---------------------------------------------------------------------------

/// A particle burst an action can emit by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterDef {
    pub bone: Option<u8>,
    /// Particles per burst.
    pub count: u8,
    pub origin: Vec3,
    pub velocity: Vec3,
    pub sprite: String,
    /// Random colour choices.
    pub colours: Vec<Vec3>,
    pub base_opacity: f32,
    pub end_opacity: f32,
    pub end_scale: f32,
    pub lifetime: RandomRange<u16>,
    pub base_radius: RandomRange<f32>,
    pub ball_speed: RandomRange<f32>,
}

impl Default for EmitterDef {
    fn default() -> Self {
        Self {
            bone: None,
            count: 0,
            origin: Vec3::ZERO,
            velocity: Vec3::ZERO,
            sprite: String::new(),
            colours: Vec::new(),
            base_opacity: 1.0,
            end_opacity: 0.0,
            end_scale: 1.0,
            lifetime: RandomRange::default(),
            base_radius: RandomRange::default(),
            ball_speed: RandomRange::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionDef
// ---------------------------------------------------------------------------

/// Persisted form of one action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionDef {
    pub blobs: BTreeMap<String, HitVolumeDef>,
    pub effects: BTreeMap<String, EffectDef>,
    pub emitters: BTreeMap<String, EmitterDef>,
    /// Timeline script source.
    pub script: String,
}

impl ActionDef {
    /// Parse an action from its JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, DefsError> {
        serde_json::from_str(json).map_err(|source| DefsError::Parse {
            what: "action".to_owned(),
            source,
        })
    }

    /// Serialise to pretty JSON, the format the editor saves.
    pub fn to_json_string(&self) -> Result<String, DefsError> {
        serde_json::to_string_pretty(self).map_err(|source| DefsError::Parse {
            what: "action".to_owned(),
            source,
        })
    }

    /// Load an action from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DefsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DefsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let def = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), blobs = def.blobs.len(), "loaded action");
        Ok(def)
    }

    /// Save an action to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DefsError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_string()?).map_err(|source| DefsError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Check every blob against the limits the collision resolver relies on.
    ///
    /// `owner` names the action in error messages.
    pub fn validate(&self, owner: &str) -> Result<(), DefsError> {
        let invalid = |key: &str, reason: String| DefsError::Invalid {
            owner: owner.to_owned(),
            key: key.to_owned(),
            reason,
        };

        for (key, blob) in &self.blobs {
            if blob.group >= MAX_GROUPS {
                return Err(invalid(
                    key,
                    format!("group {} is out of range 0..{MAX_GROUPS}", blob.group),
                ));
            }
            if !(blob.radius.is_finite() && blob.radius >= 0.0) {
                return Err(invalid(key, format!("radius {} is not a valid size", blob.radius)));
            }
            let numbers = [
                blob.damage,
                blob.freeze_mult,
                blob.freeze_di_mult,
                blob.knock_angle,
                blob.knock_base,
                blob.knock_scale,
            ];
            if numbers.iter().any(|n| !n.is_finite()) || !blob.origin.is_finite() {
                return Err(invalid(key, "contains a non-finite number".to_owned()));
            }
            if blob.origin_b.is_some_and(|b| !b.is_finite()) {
                return Err(invalid(key, "second origin is not finite".to_owned()));
            }
            if blob.damage < 0.0 {
                return Err(invalid(key, format!("negative damage {}", blob.damage)));
            }
        }

        for (key, emitter) in &self.emitters {
            if emitter.lifetime.min > emitter.lifetime.max {
                return Err(invalid(key, "lifetime range is reversed".to_owned()));
            }
        }

        Ok(())
    }

    /// Blob keys starting with `prefix`, in key order.
    ///
    /// This is how a script's `enable_hitblobs "prefix"` selects blobs.
    pub fn blobs_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a HitVolumeDef)> + 'a {
        self.blobs
            .range(prefix.to_owned()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// BLAKE3 hex digest of the editable content.
    pub fn content_hash(&self) -> String {
        crate::hash_json(self)
    }

    // -- editor round-trip --------------------------------------------------

    /// Whether any editable field differs from `other`.
    pub fn has_changes(&self, other: &ActionDef) -> bool {
        self.blobs != other.blobs
            || self.effects != other.effects
            || self.emitters != other.emitters
            || self.script != other.script
    }

    /// Overwrite the editable fields with those of `other`.
    pub fn apply_changes(&mut self, other: &ActionDef) {
        self.blobs.clone_from(&other.blobs);
        self.effects.clone_from(&other.effects);
        self.emitters.clone_from(&other.emitters);
        self.script.clone_from(&other.script);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
