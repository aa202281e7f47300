//! Persisted definition of a fighter.

use std::collections::BTreeMap;
use std::path::Path;

use fray_core::action::ActionKind;
use fray_core::attributes::Attributes;
use fray_core::volume::HurtVolumeDef;
use serde::{Deserialize, Serialize};

use crate::action_def::ActionDef;
use crate::DefsError;

/// Everything needed to spawn a fighter.
///
/// Actions are keyed by the [`ActionKind`] name (`"NeutralFirst"`,
/// `"AirUp"`, ...). A fighter need not define every action; starting an
/// undefined one runs an empty script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FighterDef {
    pub name: String,
    pub attributes: Attributes,
    pub hurt_blobs: BTreeMap<String, HurtVolumeDef>,
    pub actions: BTreeMap<String, ActionDef>,
}

impl FighterDef {
    /// Parse and validate a fighter from its JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, DefsError> {
        let def: FighterDef = serde_json::from_str(json).map_err(|source| DefsError::Parse {
            what: "fighter".to_owned(),
            source,
        })?;
        def.validate()?;
        Ok(def)
    }

    pub fn to_json_string(&self) -> Result<String, DefsError> {
        serde_json::to_string_pretty(self).map_err(|source| DefsError::Parse {
            what: "fighter".to_owned(),
            source,
        })
    }

    /// Load and validate a fighter from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DefsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DefsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let def = Self::from_json_str(&text)?;
        tracing::debug!(
            path = %path.display(),
            fighter = %def.name,
            actions = def.actions.len(),
            "loaded fighter"
        );
        Ok(def)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DefsError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_string()?).map_err(|source| DefsError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Validate attributes, hurt blobs and every action.
    pub fn validate(&self) -> Result<(), DefsError> {
        let invalid = |key: &str, reason: &str| DefsError::Invalid {
            owner: self.name.clone(),
            key: key.to_owned(),
            reason: reason.to_owned(),
        };

        let attrs = &self.attributes;
        if !(attrs.weight.is_finite() && attrs.weight > -100.0) {
            return Err(invalid("attributes", "weight must be finite and above -100"));
        }
        if !(attrs.gravity.is_finite() && attrs.gravity >= 0.0) {
            return Err(invalid("attributes", "gravity must be finite and non-negative"));
        }

        for (key, hurt) in &self.hurt_blobs {
            if !(hurt.radius.is_finite() && hurt.radius >= 0.0) {
                return Err(invalid(key, "radius is not a valid size"));
            }
            if !hurt.origin_a.is_finite() || !hurt.origin_b.is_finite() {
                return Err(invalid(key, "contains a non-finite number"));
            }
        }

        for (name, action) in &self.actions {
            if name.parse::<ActionKind>().is_err() {
                tracing::warn!(fighter = %self.name, action = %name, "rejected unknown action");
                return Err(DefsError::UnknownAction {
                    fighter: self.name.clone(),
                    name: name.clone(),
                });
            }
            action.validate(&format!("{}/{}", self.name, name))?;
        }

        Ok(())
    }

    /// The definition of `kind`, if this fighter has one.
    pub fn action(&self, kind: ActionKind) -> Option<&ActionDef> {
        self.actions.get(kind.name())
    }

    pub fn action_mut(&mut self, kind: ActionKind) -> Option<&mut ActionDef> {
        self.actions.get_mut(kind.name())
    }

    /// BLAKE3 hex digest of the whole fighter.
    pub fn content_hash(&self) -> String {
        crate::hash_json(self)
    }
}
