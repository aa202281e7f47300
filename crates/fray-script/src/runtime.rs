//! The resumable-task interface the simulation drives scripts through.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::ScriptContext;
use crate::ScriptError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Limits applied to every script task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Operations a task may execute in one resume before it fails with
    /// [`ScriptError::OutOfBudget`]. Default: 1024.
    pub op_budget: u32,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self { op_budget: 1024 }
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// A compiled script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScriptId(pub u32);

/// A started, resumable instance of a script.
///
/// Handles are never reused, so a released handle stays invalid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskHandle(pub u64);

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskHandle({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

/// Outcome of resuming a task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    /// Still waiting; nothing ran this resume.
    Running,
    /// Ran until a wait and is now suspended until `wait_until`.
    Yielded { wait_until: u32 },
    /// Ran off the end of the script.
    Finished,
    /// The script failed; the task is dead.
    Failed(ScriptError),
}

// ---------------------------------------------------------------------------
// ScriptRuntime
// ---------------------------------------------------------------------------

/// A scripting engine kept entirely behind this interface.
pub trait ScriptRuntime {
    /// Compile `source` into a reusable script. `name` is used in logs.
    fn compile(&mut self, name: &str, source: &str) -> Result<ScriptId, ScriptError>;

    /// Start a fresh task at the top of `script`.
    fn start(&mut self, script: ScriptId) -> Result<TaskHandle, ScriptError>;

    /// Resume `task` at `ctx.frame`, accumulating calls into `ctx`.
    ///
    /// Finished and failed tasks stay allocated until
    /// [`release`](Self::release) so their final status can be re-read.
    fn resume(&mut self, task: TaskHandle, ctx: &mut ScriptContext) -> TaskStatus;

    /// Drop a task. Unknown handles are ignored.
    fn release(&mut self, task: TaskHandle);

    /// Serialise every live task.
    fn save_tasks(&self) -> serde_json::Value;

    /// Replace every live task with previously saved state.
    fn restore_tasks(&mut self, state: &serde_json::Value) -> Result<(), ScriptError>;
}
