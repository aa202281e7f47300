//! Raw input sampling and discretisation.
//!
//! A [`Controller`] turns a raw per-tick [`InputSample`] (analog stick plus
//! held buttons) into an [`InputFrame`]: stick axes snapped to five discrete
//! positions, edge-triggered button presses, and "mash" flicks detected when
//! the stick travels from rest to full tilt within a few ticks.
//!
//! # Example
//!
//! ```
//! use fray_core::input::{Controller, InputSample};
//!
//! let mut controller = Controller::new();
//! let frame = controller.update(&InputSample { axis_x: 1.0, attack: true, ..Default::default() }).unwrap();
//! assert!(frame.press_attack);
//! // Stick movement is rate-limited to one half step per tick.
//! assert_eq!(frame.int_x, 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::math::Vec2;
use crate::CoreError;

/// Ticks after leaving rest during which a full tilt counts as a mash.
pub const MASH_WINDOW: u8 = 4;

// ---------------------------------------------------------------------------
// InputSample
// ---------------------------------------------------------------------------

/// Raw device state for one tick. Axes are in `[-1, 1]`, y up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSample {
    pub axis_x: f32,
    pub axis_y: f32,
    pub attack: bool,
    pub jump: bool,
    pub shield: bool,
}

// ---------------------------------------------------------------------------
// InputFrame
// ---------------------------------------------------------------------------

/// Discretised input for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Button went down this tick.
    pub press_attack: bool,
    pub press_jump: bool,
    pub press_shield: bool,

    /// Button is down.
    pub hold_attack: bool,
    pub hold_jump: bool,
    pub hold_shield: bool,

    /// Stick snapped to `{-1, -0.5, 0, 0.5, 1}` per axis.
    pub float_axis: Vec2,

    /// `float_axis * 2`, in `-2..=2`.
    pub int_x: i8,
    pub int_y: i8,

    /// Sign of the int axis, in `-1..=1`.
    pub norm_x: i8,
    pub norm_y: i8,

    /// Non-zero on the single tick a mash flick completed.
    pub mash_x: i8,
    pub mash_y: i8,

    /// Direction of the stick while inside the mash window.
    pub mod_x: i8,
    pub mod_y: i8,
}

// ---------------------------------------------------------------------------
// Discretisation helpers
// ---------------------------------------------------------------------------

fn discretise(value: f32) -> f32 {
    let abs = value.abs();
    if abs < 0.2 {
        0.0
    } else if abs > 0.7 {
        1.0_f32.copysign(value)
    } else {
        0.5_f32.copysign(value)
    }
}

/// Limit stick travel to one half step per tick relative to `previous`.
fn clamp_difference(previous: f32, target: f32) -> f32 {
    if previous == -0.5 {
        target.clamp(-1.0, 0.0)
    } else if previous == 0.5 {
        target.clamp(0.0, 1.0)
    } else if previous == -1.0 {
        target.min(-0.5)
    } else if previous == 1.0 {
        target.max(0.5)
    } else {
        target.clamp(-0.5, 0.5)
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct AxisTracker {
    previous: f32,
    time_since_zero: u8,
    done_mash: bool,
}

impl AxisTracker {
    /// Returns `(float, mash, modifier)` for this tick.
    fn update(&mut self, raw: f32) -> (f32, i8, i8) {
        let value = clamp_difference(self.previous, discretise(raw));
        let mut mash = 0;
        let mut modifier = 0;

        if value != 0.0 {
            self.time_since_zero = self.time_since_zero.saturating_add(1);
            if self.time_since_zero <= MASH_WINDOW {
                if !self.done_mash && (value == -1.0 || value == 1.0) {
                    mash = if value < 0.0 { -1 } else { 1 };
                    self.done_mash = true;
                }
                modifier = if value < 0.0 { -1 } else { 1 };
            }
        } else {
            self.time_since_zero = 0;
            self.done_mash = false;
        }

        self.previous = value;
        (value, mash, modifier)
    }
}

/// Per-fighter input discretiser. Keeps the previous tick's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    x: AxisTracker,
    y: AxisTracker,
    held: [bool; 3],
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discretise one raw sample.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if an axis is not finite. The
    /// controller state is left untouched in that case.
    pub fn update(&mut self, sample: &InputSample) -> Result<InputFrame, CoreError> {
        if !sample.axis_x.is_finite() || !sample.axis_y.is_finite() {
            return Err(CoreError::InvalidInput {
                details: format!("axis ({}, {}) is not finite", sample.axis_x, sample.axis_y),
            });
        }

        let (fx, mash_x, mod_x) = self.x.update(sample.axis_x.clamp(-1.0, 1.0));
        let (fy, mash_y, mod_y) = self.y.update(sample.axis_y.clamp(-1.0, 1.0));

        let int_x = (fx * 2.0) as i8;
        let int_y = (fy * 2.0) as i8;

        let buttons = [sample.attack, sample.jump, sample.shield];
        let pressed = [0, 1, 2].map(|i| buttons[i] && !self.held[i]);
        self.held = buttons;

        Ok(InputFrame {
            press_attack: pressed[0],
            press_jump: pressed[1],
            press_shield: pressed[2],
            hold_attack: sample.attack,
            hold_jump: sample.jump,
            hold_shield: sample.shield,
            float_axis: Vec2::new(fx, fy),
            int_x,
            int_y,
            norm_x: int_x.signum(),
            norm_y: int_y.signum(),
            mash_x,
            mash_y,
            mod_x,
            mod_y,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
