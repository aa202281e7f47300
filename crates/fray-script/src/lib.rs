//! Fray Script -- resumable action scripts behind a narrow interface.
//!
//! Actions are driven by scripts that run a few operations, then wait for a
//! later frame. The simulation never sees how a script is executed: it only
//! talks to a [`ScriptRuntime`], which hands out a [`TaskHandle`] per started
//! script and reports a [`TaskStatus`] each time the task is resumed.
//!
//! # Architecture
//!
//! - **[`ScriptRuntime`]**: compile, start, resume and release tasks. Task
//!   state can be saved and restored so simulation snapshots cover scripts.
//! - **[`ScriptContext`]**: passed to every resume; accumulates the
//!   [`ScriptCall`]s a script makes back into the core (enable hit blobs,
//!   play a sound, ...). Calls are deferred and applied by the simulation
//!   after the resume returns.
//! - **[`TimelineRuntime`]**: the reference runtime, interpreting a small
//!   line-oriented timeline language with an op budget so a script that
//!   never yields fails instead of stalling the tick.
//! - **[`ScriptError`]**: compile errors, budget exhaustion, raised errors
//!   and invalid references.
//!
//! # Example
//!
//! ```
//! use fray_script::{ScriptCall, ScriptConfig, ScriptContext, ScriptRuntime, TaskStatus, TimelineRuntime};
//!
//! let mut runtime = TimelineRuntime::new(ScriptConfig::default());
//! let script = runtime.compile("jab", "wait_until 2\nenable_hitblobs \"fist\"").unwrap();
//! let task = runtime.start(script).unwrap();
//!
//! let mut ctx = ScriptContext::new(0);
//! assert_eq!(runtime.resume(task, &mut ctx), TaskStatus::Yielded { wait_until: 2 });
//!
//! let mut ctx = ScriptContext::new(2);
//! assert_eq!(runtime.resume(task, &mut ctx), TaskStatus::Finished);
//! assert_eq!(ctx.calls, vec![ScriptCall::EnableHitblobs { prefix: "fist".into() }]);
//! ```

#![deny(unsafe_code)]

pub mod context;
mod runtime;
mod timeline;

pub use context::{ScriptCall, ScriptContext};
pub use runtime::{ScriptConfig, ScriptId, ScriptRuntime, TaskHandle, TaskStatus};
pub use timeline::TimelineRuntime;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by script compilation and execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum ScriptError {
    /// The source could not be parsed.
    #[error("line {line}: {message}")]
    Compile {
        /// 1-based source line.
        line: usize,
        message: String,
    },

    /// A handle did not name a live task or compiled script.
    #[error("unknown script task {0}")]
    UnknownTask(u64),

    /// The script ran more operations than allowed without yielding.
    #[error("script ran out of budget ({budget} ops) without yielding -- possible infinite loop")]
    OutOfBudget { budget: u32 },

    /// The script raised an error itself.
    #[error("{0}")]
    Raised(String),

    /// The script named a blob, effect, emitter or sound that doesn't exist.
    #[error("invalid {kind} '{key}'")]
    InvalidReference { kind: String, key: String },

    /// Saved task state could not be restored.
    #[error("invalid script state: {0}")]
    InvalidState(String),
}
