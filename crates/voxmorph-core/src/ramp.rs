//! Frame-rate parameter crossfades.
//!
//! When the effective parameter set changes (for example at a phoneme
//! boundary), the change is spread linearly over a configurable number of
//! frames instead of jumping, so the transformation itself has no step.
//!
//! # Example
//!
//! ```
//! use voxmorph_core::{ParameterRamp, TransformParams};
//!
//! let mut ramp = ParameterRamp::new(TransformParams::IDENTITY, 4);
//! ramp.set_target(TransformParams::new().formant_shift(1.2));
//!
//! let first = ramp.next_frame();
//! assert!(first.formant_shift_ratio > 1.0 && first.formant_shift_ratio < 1.2);
//! ```

use crate::params::TransformParams;

/// Linear crossfade between parameter sets, advanced once per output frame.
#[derive(Debug, Clone)]
pub struct ParameterRamp {
    current: TransformParams,
    start: TransformParams,
    target: TransformParams,
    ramp_frames: u32,
    frames_done: u32,
}

impl ParameterRamp {
    /// `ramp_frames = 0` disables crossfading: changes apply immediately.
    pub fn new(initial: TransformParams, ramp_frames: u32) -> Self {
        Self {
            current: initial,
            start: initial,
            target: initial,
            ramp_frames,
            frames_done: ramp_frames,
        }
    }

    /// Ramp length for a crossfade of `secs` at a hop of `hop_secs`.
    ///
    /// Any positive duration yields at least one frame.
    pub fn frames_for(secs: f64, hop_secs: f64) -> u32 {
        if secs <= 0.0 || hop_secs <= 0.0 {
            0
        } else {
            (secs / hop_secs).round().max(1.0) as u32
        }
    }

    #[inline]
    pub fn set_target(&mut self, target: TransformParams) {
        if target == self.target {
            return;
        }
        self.start = self.current;
        self.target = target;
        self.frames_done = 0;
    }

    pub fn set_immediate(&mut self, value: TransformParams) {
        self.current = value;
        self.start = value;
        self.target = value;
        self.frames_done = self.ramp_frames;
    }

    /// Call once per output frame.
    #[inline]
    pub fn next_frame(&mut self) -> TransformParams {
        if self.frames_done < self.ramp_frames {
            self.frames_done += 1;
            let t = self.frames_done as f32 / self.ramp_frames as f32;
            self.current = self.start.lerp(&self.target, t);
            // Snap when done to avoid drift
            if self.frames_done == self.ramp_frames {
                self.current = self.target;
            }
        } else {
            self.current = self.target;
        }
        self.current
    }

    #[inline]
    pub fn current(&self) -> TransformParams {
        self.current
    }

    #[inline]
    pub fn target(&self) -> TransformParams {
        self.target
    }

    #[inline]
    pub fn is_ramping(&self) -> bool {
        self.current != self.target
    }

    pub fn ramp_frames(&self) -> u32 {
        self.ramp_frames
    }
}
