//! Action identifiers and lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// Every scripted, time-boxed behaviour a fighter can perform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ActionKind {
    NeutralFirst,
    DashAttack,
    TiltDown,
    TiltForward,
    TiltUp,
    EvadeBack,
    EvadeForward,
    Dodge,
    /// Reach out from shield; its volumes are usually [`BlobKind::Grab`].
    ///
    /// [`BlobKind::Grab`]: crate::volume::BlobKind::Grab
    Grab,
    ProneAttack,
    ProneBack,
    ProneForward,
    ProneStand,
    LedgeClimb,
    SmashDown,
    SmashForward,
    SmashUp,
    AirBack,
    AirDown,
    AirForward,
    AirNeutral,
    AirUp,
    AirDodge,
    LandLight,
    LandHeavy,
    LandAttack,
    LandTumble,
}

impl ActionKind {
    /// All kinds in declaration order.
    pub const ALL: [ActionKind; 27] = [
        ActionKind::NeutralFirst,
        ActionKind::DashAttack,
        ActionKind::TiltDown,
        ActionKind::TiltForward,
        ActionKind::TiltUp,
        ActionKind::EvadeBack,
        ActionKind::EvadeForward,
        ActionKind::Dodge,
        ActionKind::Grab,
        ActionKind::ProneAttack,
        ActionKind::ProneBack,
        ActionKind::ProneForward,
        ActionKind::ProneStand,
        ActionKind::LedgeClimb,
        ActionKind::SmashDown,
        ActionKind::SmashForward,
        ActionKind::SmashUp,
        ActionKind::AirBack,
        ActionKind::AirDown,
        ActionKind::AirForward,
        ActionKind::AirNeutral,
        ActionKind::AirUp,
        ActionKind::AirDodge,
        ActionKind::LandLight,
        ActionKind::LandHeavy,
        ActionKind::LandAttack,
        ActionKind::LandTumble,
    ];

    /// Performed in the air; finishing returns the fighter to a falling state.
    pub fn is_aerial(self) -> bool {
        matches!(
            self,
            ActionKind::AirBack
                | ActionKind::AirDown
                | ActionKind::AirForward
                | ActionKind::AirNeutral
                | ActionKind::AirUp
                | ActionKind::AirDodge
        )
    }

    /// Smash attacks charge before their script starts.
    pub fn is_smash(self) -> bool {
        matches!(
            self,
            ActionKind::SmashDown | ActionKind::SmashForward | ActionKind::SmashUp
        )
    }

    /// The script must open an interrupt window before it ends.
    ///
    /// Attacks hand control back through `allow_interrupt`; landings, dodges
    /// and other recovery actions simply run to completion and may not call
    /// it.
    pub fn needs_interrupt(self) -> bool {
        !matches!(
            self,
            ActionKind::EvadeBack
                | ActionKind::EvadeForward
                | ActionKind::Dodge
                | ActionKind::Grab
                | ActionKind::ProneBack
                | ActionKind::ProneForward
                | ActionKind::ProneStand
                | ActionKind::LedgeClimb
                | ActionKind::AirDodge
                | ActionKind::LandLight
                | ActionKind::LandHeavy
                | ActionKind::LandAttack
                | ActionKind::LandTumble
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::NeutralFirst => "NeutralFirst",
            ActionKind::DashAttack => "DashAttack",
            ActionKind::TiltDown => "TiltDown",
            ActionKind::TiltForward => "TiltForward",
            ActionKind::TiltUp => "TiltUp",
            ActionKind::EvadeBack => "EvadeBack",
            ActionKind::EvadeForward => "EvadeForward",
            ActionKind::Dodge => "Dodge",
            ActionKind::Grab => "Grab",
            ActionKind::ProneAttack => "ProneAttack",
            ActionKind::ProneBack => "ProneBack",
            ActionKind::ProneForward => "ProneForward",
            ActionKind::ProneStand => "ProneStand",
            ActionKind::LedgeClimb => "LedgeClimb",
            ActionKind::SmashDown => "SmashDown",
            ActionKind::SmashForward => "SmashForward",
            ActionKind::SmashUp => "SmashUp",
            ActionKind::AirBack => "AirBack",
            ActionKind::AirDown => "AirDown",
            ActionKind::AirForward => "AirForward",
            ActionKind::AirNeutral => "AirNeutral",
            ActionKind::AirUp => "AirUp",
            ActionKind::AirDodge => "AirDodge",
            ActionKind::LandLight => "LandLight",
            ActionKind::LandHeavy => "LandHeavy",
            ActionKind::LandAttack => "LandAttack",
            ActionKind::LandTumble => "LandTumble",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| CoreError::UnknownAction {
                name: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

/// Lifecycle of an action's script.
///
/// `None -> Running -> (AllowInterrupt) -> Finished`, or `RuntimeError` when
/// the script fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionStatus {
    /// Not started.
    #[default]
    None,
    Running,
    /// The script opened its interrupt window.
    AllowInterrupt,
    Finished,
    RuntimeError,
}

impl ActionStatus {
    /// The owning state may leave the action state.
    pub fn can_leave(self) -> bool {
        matches!(self, ActionStatus::AllowInterrupt | ActionStatus::Finished)
    }

    /// Still ticking.
    pub fn is_active(self) -> bool {
        matches!(self, ActionStatus::Running | ActionStatus::AllowInterrupt)
    }
}
