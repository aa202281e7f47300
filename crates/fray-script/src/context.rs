//! Calls a script makes back into the core.
//!
//! # Design
//!
//! - **Reads are immediate:** the context carries the action frame the core
//!   computed, which the script uses to validate waits.
//! - **Writes are deferred:** everything a script asks of the core is pushed
//!   onto [`ScriptContext::calls`] and applied by the simulation after the
//!   resume returns, in call order.
//! - **Frames are cross-checked:** the runtime reports the frame its own
//!   timeline believes it is on, so the core can detect a desync.

use serde::{Deserialize, Serialize};

/// A deferred request from a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptCall {
    /// Enable every hit blob whose key starts with `prefix`.
    EnableHitblobs { prefix: String },
    /// Disable all of the action's hit blobs.
    DisableHitblobs { reset_collisions: bool },
    /// Clear the hit-bits rows this fighter attacks with.
    ResetCollisions,
    /// Open the interrupt window.
    AllowInterrupt,
    PlayEffect { key: String },
    EmitParticles { key: String },
    PlaySound { key: String },
}

/// Per-resume state shared between the core and a script task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptContext {
    /// The action frame as counted by the core.
    pub frame: u32,

    /// Calls made during this resume, drained by the core.
    pub calls: Vec<ScriptCall>,

    /// The frame the task believed it resumed on, if it ran.
    pub reported_frame: Option<u32>,

    /// Operations executed during this resume.
    pub ops_executed: u32,
}

impl ScriptContext {
    pub fn new(frame: u32) -> Self {
        Self {
            frame,
            ..Self::default()
        }
    }

    /// Take the accumulated calls, leaving the list empty.
    pub fn drain_calls(&mut self) -> Vec<ScriptCall> {
        std::mem::take(&mut self.calls)
    }

    /// Whether the runtime's own timeline disagrees with the core's frame.
    pub fn is_desynced(&self) -> bool {
        self.reported_frame.is_some_and(|f| f != self.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_calls() {
        let mut ctx = ScriptContext::new(3);
        ctx.calls.push(ScriptCall::ResetCollisions);
        ctx.calls.push(ScriptCall::AllowInterrupt);
        let calls = ctx.drain_calls();
        assert_eq!(calls.len(), 2);
        assert!(ctx.calls.is_empty());
    }

    #[test]
    fn desync_only_when_reported_differs() {
        let mut ctx = ScriptContext::new(5);
        assert!(!ctx.is_desynced(), "no report is never a desync");
        ctx.reported_frame = Some(5);
        assert!(!ctx.is_desynced());
        ctx.reported_frame = Some(4);
        assert!(ctx.is_desynced());
    }
}
