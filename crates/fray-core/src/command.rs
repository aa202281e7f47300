//! Buffered discrete commands derived from input.
//!
//! Each tick the [`CommandBuffer`] turns the fighter's discretised
//! [`InputFrame`] into zero or more [`Command`]s and pushes them as a new
//! frame at the front of a short history; the oldest frame falls off. The
//! state machine later consumes commands. A successful consume removes the
//! command from **every** retained frame, so a buffered press is acted on at
//! most once no matter how many state checks look for it.
//!
//! # Example
//!
//! ```
//! use fray_core::command::{Command, CommandBuffer};
//! use fray_core::input::InputFrame;
//!
//! let mut buffer = CommandBuffer::new(8);
//! let input = InputFrame { press_jump: true, hold_jump: true, ..Default::default() };
//! buffer.advance(&input, 1);
//! buffer.advance(&InputFrame::default(), 1);
//!
//! assert!(buffer.consume(Command::Jump));
//! assert!(!buffer.consume(Command::Jump), "a command is consumed at most once");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::input::InputFrame;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A discrete, short-lived intent extracted from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Shield,
    Jump,
    TurnLeft,
    TurnRight,
    MashDown,
    MashUp,
    MashLeft,
    MashRight,
    SmashDown,
    SmashUp,
    SmashLeft,
    SmashRight,
    AttackDown,
    AttackUp,
    AttackLeft,
    AttackRight,
    AttackNeutral,
}

impl Command {
    /// Every attack-button command, used for "any attack" consumption.
    pub const ANY_ATTACK: [Command; 9] = [
        Command::SmashDown,
        Command::SmashUp,
        Command::SmashLeft,
        Command::SmashRight,
        Command::AttackDown,
        Command::AttackUp,
        Command::AttackLeft,
        Command::AttackRight,
        Command::AttackNeutral,
    ];
}

/// Pick the left or right variant of a command by facing.
#[inline]
pub fn by_facing(facing: i8, left: Command, right: Command) -> Command {
    if facing < 0 {
        left
    } else {
        right
    }
}

/// Derive this tick's commands, in push order.
///
/// Turn commands compare the stick against the fighter's *current* facing,
/// so a reversal queued before a facing change still resolves correctly.
pub fn derive_commands(input: &InputFrame, facing: i8) -> Vec<Command> {
    let mut out = Vec::new();

    if input.press_shield {
        out.push(Command::Shield);
    }
    if input.press_jump {
        out.push(Command::Jump);
    }

    if facing == 1 && input.norm_x == -1 {
        out.push(Command::TurnLeft);
    }
    if facing == -1 && input.norm_x == 1 {
        out.push(Command::TurnRight);
    }

    match input.mash_y {
        -1 => out.push(Command::MashDown),
        1 => out.push(Command::MashUp),
        _ => {}
    }
    match input.mash_x {
        -1 => out.push(Command::MashLeft),
        1 => out.push(Command::MashRight),
        _ => {}
    }

    if input.press_attack {
        let attack = if input.mod_y == -1 {
            Command::SmashDown
        } else if input.mod_y == 1 {
            Command::SmashUp
        } else if input.mod_x == -1 {
            Command::SmashLeft
        } else if input.mod_x == 1 {
            Command::SmashRight
        } else if input.int_y == -2 {
            Command::AttackDown
        } else if input.int_y == 2 {
            Command::AttackUp
        } else if input.int_x == -2 {
            Command::AttackLeft
        } else if input.int_x == 2 {
            Command::AttackRight
        } else if input.int_y == -1 {
            Command::AttackDown
        } else if input.int_y == 1 {
            Command::AttackUp
        } else if input.int_x == -1 {
            Command::AttackLeft
        } else if input.int_x == 1 {
            Command::AttackRight
        } else {
            Command::AttackNeutral
        };
        out.push(attack);
    }

    out
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// Fixed-depth history of per-tick command lists. Frame 0 is the newest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandBuffer {
    frames: VecDeque<Vec<Command>>,
    depth: usize,
}

impl CommandBuffer {
    /// Create a buffer retaining `depth` frames.
    ///
    /// # Panics
    ///
    /// Panics if `depth` is zero.
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "command buffer depth must be positive");
        let mut frames = VecDeque::with_capacity(depth);
        frames.resize_with(depth, Vec::new);
        Self { frames, depth }
    }

    /// Shift history by one tick and push the commands derived from `input`.
    pub fn advance(&mut self, input: &InputFrame, facing: i8) {
        self.push_frame(derive_commands(input, facing));
    }

    /// Shift history by one tick and push an explicit command list.
    pub fn push_frame(&mut self, commands: Vec<Command>) {
        self.frames.pop_back();
        self.frames.push_front(commands);
    }

    /// Whether `cmd` is present in any retained frame.
    pub fn contains(&self, cmd: Command) -> bool {
        self.frames.iter().any(|f| f.contains(&cmd))
    }

    /// Consume `cmd`, removing it from every retained frame.
    pub fn consume(&mut self, cmd: Command) -> bool {
        let mut found = false;
        for frame in &mut self.frames {
            let before = frame.len();
            frame.retain(|c| *c != cmd);
            found |= frame.len() != before;
        }
        found
    }

    /// Consume whichever command of `set` was buffered earliest.
    ///
    /// Frames are searched from oldest to newest and, within a frame, in push
    /// order. The chosen command is removed from every frame.
    pub fn consume_oldest_matching(&mut self, set: &[Command]) -> Option<Command> {
        let chosen = self
            .frames
            .iter()
            .rev()
            .flat_map(|f| f.iter())
            .find(|c| set.contains(c))
            .copied()?;
        self.consume(chosen);
        Some(chosen)
    }

    /// Consume the facing-relative variant of a command.
    pub fn consume_facing(&mut self, facing: i8, left: Command, right: Command) -> bool {
        self.consume(by_facing(facing, left, right))
    }

    /// Oldest-first consumption of a facing-relative set.
    pub fn consume_oldest_facing(
        &mut self,
        facing: i8,
        left: &[Command],
        right: &[Command],
    ) -> Option<Command> {
        if facing < 0 {
            self.consume_oldest_matching(left)
        } else {
            self.consume_oldest_matching(right)
        }
    }

    /// Drop all buffered commands.
    pub fn clear(&mut self) {
        for frame in &mut self.frames {
            frame.clear();
        }
    }

    // -- accessors ----------------------------------------------------------

    /// Retained frames, newest first.
    pub fn frames(&self) -> impl Iterator<Item = &[Command]> {
        self.frames.iter().map(|f| f.as_slice())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
