//! Reference script runtime: a line-oriented timeline language.
//!
//! One operation per line, `#` starts a comment:
//!
//! ```text
//! wait_until 4                 # suspend until action frame 4
//! enable_hitblobs "fist"       # every blob whose key starts with "fist"
//! wait_for 3                   # suspend for 3 frames
//! disable_hitblobs reset       # disable blobs and reset collisions
//! play_sound "swing"
//! loop 2                       # repeat the body twice (`loop` alone repeats forever)
//!     emit_particles "dust"
//!     wait_for 1
//! end
//! allow_interrupt
//! ```
//!
//! Every executed operation costs one unit of the per-resume op budget, so a
//! loop with no waits fails with [`ScriptError::OutOfBudget`] instead of
//! stalling the tick.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::context::{ScriptCall, ScriptContext};
use crate::runtime::{ScriptConfig, ScriptId, ScriptRuntime, TaskHandle, TaskStatus};
use crate::ScriptError;

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    WaitUntil(u32),
    WaitFor(u32),
    Call(ScriptCall),
    /// `end` is the index of the matching `End`.
    Loop { count: Option<u32>, end: usize },
    /// `body` is the index of the first op inside the loop.
    End { body: usize },
    Raise(String),
}

#[derive(Debug, Clone)]
struct Program {
    name: String,
    ops: Vec<Op>,
}

fn compile_error(line: usize, message: impl Into<String>) -> ScriptError {
    ScriptError::Compile {
        line,
        message: message.into(),
    }
}

/// Strip a trailing `#` comment, ignoring `#` inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_quote = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            '#' if !in_quote => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_frame(arg: &str, line: usize) -> Result<u32, ScriptError> {
    arg.parse::<u32>()
        .map_err(|_| compile_error(line, format!("expected a frame number, got '{arg}'")))
}

fn parse_string(arg: &str, line: usize) -> Result<String, ScriptError> {
    let inner = arg
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .filter(|s| !s.contains('"'))
        .ok_or_else(|| compile_error(line, format!("expected a quoted string, got '{arg}'")))?;
    Ok(inner.to_owned())
}

fn no_args(op: Op, arg: &str, line: usize) -> Result<Op, ScriptError> {
    if arg.is_empty() {
        Ok(op)
    } else {
        Err(compile_error(line, format!("unexpected argument '{arg}'")))
    }
}

fn parse(name: &str, source: &str) -> Result<Program, ScriptError> {
    let mut ops = Vec::new();
    // (op index, source line) of every open `loop`.
    let mut open_loops: Vec<(usize, usize)> = Vec::new();

    for (i, raw) in source.lines().enumerate() {
        let line = i + 1;
        let text = strip_comment(raw).trim();
        if text.is_empty() {
            continue;
        }
        let (word, arg) = match text.split_once(char::is_whitespace) {
            Some((w, a)) => (w, a.trim()),
            None => (text, ""),
        };

        let op = match word {
            "wait_until" => Op::WaitUntil(parse_frame(arg, line)?),
            "wait_for" => Op::WaitFor(parse_frame(arg, line)?),
            "enable_hitblobs" => Op::Call(ScriptCall::EnableHitblobs {
                prefix: parse_string(arg, line)?,
            }),
            "disable_hitblobs" => match arg {
                "" => Op::Call(ScriptCall::DisableHitblobs {
                    reset_collisions: false,
                }),
                "reset" => Op::Call(ScriptCall::DisableHitblobs {
                    reset_collisions: true,
                }),
                other => return Err(compile_error(line, format!("unexpected argument '{other}'"))),
            },
            "reset_collisions" => no_args(Op::Call(ScriptCall::ResetCollisions), arg, line)?,
            "allow_interrupt" => no_args(Op::Call(ScriptCall::AllowInterrupt), arg, line)?,
            "play_effect" => Op::Call(ScriptCall::PlayEffect {
                key: parse_string(arg, line)?,
            }),
            "emit_particles" => Op::Call(ScriptCall::EmitParticles {
                key: parse_string(arg, line)?,
            }),
            "play_sound" => Op::Call(ScriptCall::PlaySound {
                key: parse_string(arg, line)?,
            }),
            "raise" => Op::Raise(parse_string(arg, line)?),
            "loop" => {
                let count = if arg.is_empty() {
                    None
                } else {
                    Some(parse_frame(arg, line)?)
                };
                open_loops.push((ops.len(), line));
                Op::Loop { count, end: 0 }
            }
            "end" => {
                let (start, _) = open_loops
                    .pop()
                    .ok_or_else(|| compile_error(line, "'end' without a matching 'loop'"))?;
                let end_index = ops.len();
                if let Some(Op::Loop { end, .. }) = ops.get_mut(start) {
                    *end = end_index;
                }
                no_args(Op::End { body: start + 1 }, arg, line)?
            }
            other => return Err(compile_error(line, format!("unknown operation '{other}'"))),
        };
        ops.push(op);
    }

    if let Some((_, line)) = open_loops.pop() {
        return Err(compile_error(line, "'loop' without a matching 'end'"));
    }

    Ok(Program {
        name: name.to_owned(),
        ops,
    })
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LoopFrame {
    body: usize,
    remaining: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TaskState {
    Active,
    Finished,
    Failed(ScriptError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    script: ScriptId,
    pc: usize,
    wait_until: u32,
    loops: Vec<LoopFrame>,
    state: TaskState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TaskTable {
    next: u64,
    tasks: BTreeMap<u64, Task>,
}

/// Run `task` until it waits, ends or fails.
fn run(
    program: &Program,
    task: &mut Task,
    ctx: &mut ScriptContext,
    budget: u32,
) -> Result<TaskStatus, ScriptError> {
    loop {
        let Some(op) = program.ops.get(task.pc) else {
            task.state = TaskState::Finished;
            return Ok(TaskStatus::Finished);
        };
        if ctx.ops_executed >= budget {
            return Err(ScriptError::OutOfBudget { budget });
        }
        ctx.ops_executed += 1;
        task.pc += 1;

        match op {
            Op::WaitUntil(frame) => {
                if *frame <= ctx.frame {
                    return Err(ScriptError::Raised(format!(
                        "can't wait for {frame} on {}",
                        ctx.frame
                    )));
                }
                task.wait_until = *frame;
                return Ok(TaskStatus::Yielded { wait_until: *frame });
            }
            Op::WaitFor(frames) => {
                if *frames == 0 {
                    return Err(ScriptError::Raised("can't wait for 0 frames".to_owned()));
                }
                task.wait_until = ctx.frame.saturating_add(*frames);
                return Ok(TaskStatus::Yielded {
                    wait_until: task.wait_until,
                });
            }
            Op::Call(call) => ctx.calls.push(call.clone()),
            Op::Loop { count, end } => {
                if *count == Some(0) {
                    task.pc = end + 1;
                } else {
                    task.loops.push(LoopFrame {
                        body: task.pc,
                        remaining: *count,
                    });
                }
            }
            Op::End { body } => {
                let frame = task
                    .loops
                    .last_mut()
                    .ok_or_else(|| ScriptError::InvalidState("loop stack underflow".to_owned()))?;
                match frame.remaining.as_mut() {
                    None => task.pc = *body,
                    Some(n) => {
                        *n -= 1;
                        if *n > 0 {
                            task.pc = *body;
                        } else {
                            task.loops.pop();
                        }
                    }
                }
            }
            Op::Raise(message) => return Err(ScriptError::Raised(message.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// TimelineRuntime
// ---------------------------------------------------------------------------

/// Interpreter for the timeline language.
///
/// Programs are keyed by name. Compiling a name again replaces its program:
/// in place when no task is running it, otherwise in a fresh slot while the
/// old program stays alive until its last task is released. Freed slots are
/// reused. Only tasks are saved and restored.
#[derive(Debug)]
pub struct TimelineRuntime {
    config: ScriptConfig,
    programs: Vec<Option<Program>>,
    names: BTreeMap<String, ScriptId>,
    /// Replaced programs that a live task still runs.
    retired: BTreeSet<ScriptId>,
    table: TaskTable,
}

impl TimelineRuntime {
    pub fn new(config: ScriptConfig) -> Self {
        Self {
            config,
            programs: Vec::new(),
            names: BTreeMap::new(),
            retired: BTreeSet::new(),
            table: TaskTable::default(),
        }
    }

    /// Number of live (unreleased) tasks.
    pub fn task_count(&self) -> usize {
        self.table.tasks.len()
    }

    /// Number of programs held, including replaced ones still running.
    pub fn program_count(&self) -> usize {
        self.programs.iter().filter(|p| p.is_some()).count()
    }

    fn program(&self, script: ScriptId) -> Option<&Program> {
        self.programs.get(script.0 as usize).and_then(Option::as_ref)
    }

    fn in_use(&self, script: ScriptId) -> bool {
        self.table.tasks.values().any(|t| t.script == script)
    }

    fn free_slot(&mut self) -> ScriptId {
        let index = match self.programs.iter().position(Option::is_none) {
            Some(index) => index,
            None => {
                self.programs.push(None);
                self.programs.len() - 1
            }
        };
        ScriptId(index as u32)
    }

    /// Free retired programs no task runs any more.
    fn sweep_retired(&mut self) {
        let idle: Vec<ScriptId> = self
            .retired
            .iter()
            .copied()
            .filter(|&id| !self.in_use(id))
            .collect();
        for id in idle {
            self.retired.remove(&id);
            self.programs[id.0 as usize] = None;
        }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }
}

impl Default for TimelineRuntime {
    fn default() -> Self {
        Self::new(ScriptConfig::default())
    }
}

impl ScriptRuntime for TimelineRuntime {
    fn compile(&mut self, name: &str, source: &str) -> Result<ScriptId, ScriptError> {
        let program = parse(name, source)?;
        let id = match self.names.get(name).copied() {
            Some(current) if !self.in_use(current) => current,
            Some(current) => {
                self.retired.insert(current);
                self.free_slot()
            }
            None => self.free_slot(),
        };
        tracing::debug!(script = name, ops = program.ops.len(), slot = id.0, "script compiled");
        self.programs[id.0 as usize] = Some(program);
        self.names.insert(name.to_owned(), id);
        Ok(id)
    }

    fn start(&mut self, script: ScriptId) -> Result<TaskHandle, ScriptError> {
        if self.program(script).is_none() || self.retired.contains(&script) {
            return Err(ScriptError::UnknownTask(u64::from(script.0)));
        }
        let handle = TaskHandle(self.table.next);
        self.table.next += 1;
        self.table.tasks.insert(
            handle.0,
            Task {
                script,
                pc: 0,
                wait_until: 0,
                loops: Vec::new(),
                state: TaskState::Active,
            },
        );
        Ok(handle)
    }

    fn resume(&mut self, task: TaskHandle, ctx: &mut ScriptContext) -> TaskStatus {
        let Some(entry) = self.table.tasks.get_mut(&task.0) else {
            return TaskStatus::Failed(ScriptError::UnknownTask(task.0));
        };
        match &entry.state {
            TaskState::Finished => return TaskStatus::Finished,
            TaskState::Failed(e) => return TaskStatus::Failed(e.clone()),
            TaskState::Active => {}
        }
        if ctx.frame < entry.wait_until {
            return TaskStatus::Running;
        }
        let Some(program) = self.programs.get(entry.script.0 as usize).and_then(Option::as_ref)
        else {
            return TaskStatus::Failed(ScriptError::UnknownTask(task.0));
        };

        ctx.reported_frame = Some(entry.wait_until);
        match run(program, entry, ctx, self.config.op_budget) {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!(script = %program.name, ?task, error = %e, "script task failed");
                entry.state = TaskState::Failed(e.clone());
                TaskStatus::Failed(e)
            }
        }
    }

    fn release(&mut self, task: TaskHandle) {
        if let Some(removed) = self.table.tasks.remove(&task.0) {
            if self.retired.contains(&removed.script) {
                self.sweep_retired();
            }
        }
    }

    fn save_tasks(&self) -> serde_json::Value {
        serde_json::to_value(&self.table).expect("task table should always be JSON-serializable")
    }

    fn restore_tasks(&mut self, state: &serde_json::Value) -> Result<(), ScriptError> {
        let table: TaskTable = serde_json::from_value(state.clone())
            .map_err(|e| ScriptError::InvalidState(e.to_string()))?;
        if let Some(bad) = table.tasks.values().find(|t| self.program(t.script).is_none()) {
            return Err(ScriptError::InvalidState(format!(
                "task refers to script {} which is not compiled",
                bad.script.0
            )));
        }
        self.table = table;
        self.sweep_retired();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_end(rt: &mut TimelineRuntime, source: &str, frames: u32) -> (Vec<ScriptCall>, TaskStatus) {
        let script = rt.compile("test", source).unwrap();
        let task = rt.start(script).unwrap();
        let mut calls = Vec::new();
        let mut status = TaskStatus::Running;
        for frame in 0..frames {
            let mut ctx = ScriptContext::new(frame);
            status = rt.resume(task, &mut ctx);
            calls.extend(ctx.drain_calls());
            if matches!(status, TaskStatus::Finished | TaskStatus::Failed(_)) {
                break;
            }
        }
        (calls, status)
    }

    // -- 1. Parsing ---------------------------------------------------------

    #[test]
    fn comments_and_blank_lines_ignored() {
        let program = parse("t", "# header\n\n  allow_interrupt  # trailing\n").unwrap();
        assert_eq!(program.ops, vec![Op::Call(ScriptCall::AllowInterrupt)]);
    }

    #[test]
    fn hash_inside_string_is_not_a_comment() {
        let program = parse("t", "play_sound \"hit#2\"").unwrap();
        assert_eq!(
            program.ops,
            vec![Op::Call(ScriptCall::PlaySound {
                key: "hit#2".into()
            })]
        );
    }

    #[test]
    fn unknown_op_reports_line() {
        let err = parse("t", "wait_until 2\nfalcon_punch").unwrap_err();
        assert_eq!(
            err,
            ScriptError::Compile {
                line: 2,
                message: "unknown operation 'falcon_punch'".into()
            }
        );
    }

    #[test]
    fn unquoted_string_rejected() {
        assert!(matches!(
            parse("t", "enable_hitblobs fist"),
            Err(ScriptError::Compile { line: 1, .. })
        ));
    }

    #[test]
    fn unbalanced_loops_rejected() {
        assert!(matches!(
            parse("t", "loop\nwait_for 1"),
            Err(ScriptError::Compile { line: 1, .. })
        ));
        assert!(matches!(
            parse("t", "wait_for 1\nend"),
            Err(ScriptError::Compile { line: 2, .. })
        ));
    }

    // -- 2. Execution -------------------------------------------------------

    #[test]
    fn waits_split_execution_across_frames() {
        let mut rt = TimelineRuntime::default();
        let script = rt
            .compile("t", "wait_until 3\nenable_hitblobs \"a\"\nwait_for 2\ndisable_hitblobs")
            .unwrap();
        let task = rt.start(script).unwrap();

        let mut ctx = ScriptContext::new(0);
        assert_eq!(rt.resume(task, &mut ctx), TaskStatus::Yielded { wait_until: 3 });
        assert!(ctx.calls.is_empty());

        let mut ctx = ScriptContext::new(1);
        assert_eq!(rt.resume(task, &mut ctx), TaskStatus::Running);
        assert_eq!(ctx.ops_executed, 0);

        let mut ctx = ScriptContext::new(3);
        assert_eq!(rt.resume(task, &mut ctx), TaskStatus::Yielded { wait_until: 5 });
        assert_eq!(ctx.reported_frame, Some(3));
        assert_eq!(
            ctx.calls,
            vec![ScriptCall::EnableHitblobs { prefix: "a".into() }]
        );

        let mut ctx = ScriptContext::new(5);
        assert_eq!(rt.resume(task, &mut ctx), TaskStatus::Finished);
        assert_eq!(
            ctx.calls,
            vec![ScriptCall::DisableHitblobs {
                reset_collisions: false
            }]
        );
        assert_eq!(rt.resume(task, &mut ScriptContext::new(6)), TaskStatus::Finished);
    }

    #[test]
    fn counted_loop_repeats_body() {
        let mut rt = TimelineRuntime::default();
        let (calls, status) = run_to_end(
            &mut rt,
            "loop 3\nemit_particles \"dust\"\nwait_for 1\nend\nallow_interrupt",
            20,
        );
        assert_eq!(status, TaskStatus::Finished);
        let dust = calls
            .iter()
            .filter(|c| matches!(c, ScriptCall::EmitParticles { .. }))
            .count();
        assert_eq!(dust, 3);
        assert_eq!(calls.last(), Some(&ScriptCall::AllowInterrupt));
    }

    #[test]
    fn zero_count_loop_is_skipped() {
        let mut rt = TimelineRuntime::default();
        let (calls, status) = run_to_end(&mut rt, "loop 0\nplay_sound \"x\"\nend\nreset_collisions", 2);
        assert_eq!(status, TaskStatus::Finished);
        assert_eq!(calls, vec![ScriptCall::ResetCollisions]);
    }

    // -- 3. Failures --------------------------------------------------------

    #[test]
    fn loop_without_wait_runs_out_of_budget() {
        let mut rt = TimelineRuntime::new(ScriptConfig { op_budget: 64 });
        let (_, status) = run_to_end(&mut rt, "loop\nreset_collisions\nend", 1);
        assert_eq!(
            status,
            TaskStatus::Failed(ScriptError::OutOfBudget { budget: 64 })
        );
    }

    #[test]
    fn waiting_for_a_past_frame_fails() {
        let mut rt = TimelineRuntime::default();
        let (_, status) = run_to_end(&mut rt, "wait_until 4\nwait_until 4", 10);
        assert_eq!(
            status,
            TaskStatus::Failed(ScriptError::Raised("can't wait for 4 on 4".into()))
        );
    }

    #[test]
    fn raise_fails_and_stays_failed() {
        let mut rt = TimelineRuntime::default();
        let script = rt.compile("t", "raise \"boom\"").unwrap();
        let task = rt.start(script).unwrap();
        let expected = TaskStatus::Failed(ScriptError::Raised("boom".into()));
        assert_eq!(rt.resume(task, &mut ScriptContext::new(0)), expected);
        assert_eq!(rt.resume(task, &mut ScriptContext::new(1)), expected);
    }

    #[test]
    fn released_task_is_unknown() {
        let mut rt = TimelineRuntime::default();
        let script = rt.compile("t", "wait_for 1").unwrap();
        let task = rt.start(script).unwrap();
        rt.release(task);
        assert_eq!(rt.task_count(), 0);
        assert_eq!(
            rt.resume(task, &mut ScriptContext::new(0)),
            TaskStatus::Failed(ScriptError::UnknownTask(task.0))
        );
    }

    // -- 4. Save / restore --------------------------------------------------

    #[test]
    fn restored_tasks_resume_identically() {
        let mut rt = TimelineRuntime::default();
        let script = rt
            .compile("t", "wait_until 2\nplay_sound \"a\"\nwait_until 5\nplay_sound \"b\"")
            .unwrap();
        let task = rt.start(script).unwrap();
        rt.resume(task, &mut ScriptContext::new(0));
        let saved = rt.save_tasks();

        let mut ctx = ScriptContext::new(2);
        rt.resume(task, &mut ctx);
        assert_eq!(ctx.calls, vec![ScriptCall::PlaySound { key: "a".into() }]);

        rt.restore_tasks(&saved).unwrap();
        let mut again = ScriptContext::new(2);
        rt.resume(task, &mut again);
        assert_eq!(again.calls, ctx.calls);
    }

    #[test]
    fn restore_rejects_unknown_script() {
        let mut rt = TimelineRuntime::default();
        let state = serde_json::json!({
            "next": 1,
            "tasks": { "0": { "script": 7, "pc": 0, "wait_until": 0, "loops": [], "state": "Active" } }
        });
        assert!(matches!(
            rt.restore_tasks(&state),
            Err(ScriptError::InvalidState(_))
        ));
    }

    // -- 5. Recompiling -----------------------------------------------------

    #[test]
    fn recompiling_a_name_replaces_its_program() {
        let mut rt = TimelineRuntime::default();
        let first = rt.compile("jab", "play_sound \"old\"").unwrap();
        for _ in 0..5 {
            assert_eq!(rt.compile("jab", "play_sound \"new\"").unwrap(), first);
        }
        assert_eq!(rt.program_count(), 1);

        let task = rt.start(first).unwrap();
        let mut ctx = ScriptContext::new(0);
        assert_eq!(rt.resume(task, &mut ctx), TaskStatus::Finished);
        assert_eq!(ctx.calls, vec![ScriptCall::PlaySound { key: "new".into() }]);
    }

    #[test]
    fn running_task_keeps_replaced_program_until_released() {
        let mut rt = TimelineRuntime::default();
        let old = rt.compile("jab", "wait_until 1\nplay_sound \"old\"").unwrap();
        let task = rt.start(old).unwrap();
        rt.resume(task, &mut ScriptContext::new(0));

        let new = rt.compile("jab", "play_sound \"new\"").unwrap();
        assert_ne!(new, old);
        assert_eq!(rt.program_count(), 2);
        assert!(rt.start(old).is_err());

        let mut ctx = ScriptContext::new(1);
        rt.resume(task, &mut ctx);
        assert_eq!(ctx.calls, vec![ScriptCall::PlaySound { key: "old".into() }]);

        rt.release(task);
        assert_eq!(rt.program_count(), 1);
        assert_eq!(rt.compile("jab", "allow_interrupt").unwrap(), new);
        assert_eq!(rt.compile("kick", "allow_interrupt").unwrap(), old);
        assert_eq!(rt.program_count(), 2);
    }
}
