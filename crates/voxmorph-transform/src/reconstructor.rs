//! Weighted overlap-add back to a continuous stream.
//!
//! Frames arrive in the analysis-window domain. Each is multiplied by the
//! synthesis window and summed into an accumulator while `w_a * w_s` is
//! summed into a parallel weight buffer. A sample is final once no later
//! frame can overlap it, at which point it is divided by its weight and
//! emitted:
//!
//! ```text
//! y[n] = sum_k w_s[n - kH] * x_k[n - kH] / max(sum_k w_a * w_s, floor)
//! ```
//!
//! The floor is `floor_fraction` times the steady-state weight, so the
//! sparsely covered stream edges taper instead of amplifying. The first
//! `frame_size - hop_size` samples of the padded timeline are the framer's
//! zero padding and are never emitted.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use voxmorph_core::{overlap_gain, Error, FrameLayout, Result, WindowKind};

use crate::frame::SynthesizedFrame;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructorConfig {
    /// Window the frames already carry.
    pub analysis_window: WindowKind,
    pub synthesis_window: WindowKind,
    /// Divide by the accumulated window weight. When off, divide by the
    /// steady-state constant instead.
    pub normalize: bool,
    /// Weight floor as a fraction of the steady-state weight.
    pub floor_fraction: f32,
}

impl Default for ReconstructorConfig {
    fn default() -> Self {
        Self {
            analysis_window: WindowKind::Hann,
            synthesis_window: WindowKind::Hann,
            normalize: true,
            floor_fraction: 0.1,
        }
    }
}

impl ReconstructorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.floor_fraction > 0.0 && self.floor_fraction <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "weight floor fraction must be in (0, 1], got {}",
                self.floor_fraction
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructorState {
    /// The tail holds partial overlap awaiting later frames.
    Accumulating,
    /// End of stream: the tail has been flushed and no more frames are
    /// accepted.
    Draining,
}

#[derive(Debug)]
pub struct OverlapAddReconstructor {
    layout: FrameLayout,
    config: ReconstructorConfig,
    synthesis: Vec<f32>,
    frame_weight: Vec<f32>,
    steady: f32,
    accumulator: VecDeque<f32>,
    weight: VecDeque<f32>,
    /// Padded-timeline position of `accumulator[0]`.
    base: u64,
    next_index: u64,
    emitted: u64,
    state: ReconstructorState,
}

impl OverlapAddReconstructor {
    pub fn new(layout: FrameLayout, config: ReconstructorConfig) -> Result<Self> {
        layout.validate()?;
        config.validate()?;

        let analysis = config.analysis_window.coefficients(layout.frame_size);
        let synthesis = config.synthesis_window.coefficients(layout.frame_size);
        let frame_weight: Vec<f32> = analysis.iter().zip(&synthesis).map(|(a, s)| a * s).collect();
        let steady = overlap_gain(&analysis, &synthesis, layout.hop_size);
        if steady <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "analysis and synthesis windows have no overlap gain".into(),
            ));
        }
        debug!(steady, normalize = config.normalize, "overlap-add ready");

        Ok(Self {
            layout,
            config,
            synthesis,
            frame_weight,
            steady,
            accumulator: VecDeque::with_capacity(layout.frame_size),
            weight: VecDeque::with_capacity(layout.frame_size),
            base: 0,
            next_index: 0,
            emitted: 0,
            state: ReconstructorState::Accumulating,
        })
    }

    pub fn state(&self) -> ReconstructorState {
        self.state
    }

    /// Samples emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Steady-state window weight.
    pub fn steady_gain(&self) -> f32 {
        self.steady
    }

    /// Add the next frame and return the samples it completes.
    pub fn push(&mut self, frame: SynthesizedFrame) -> Result<Vec<f32>> {
        if self.state == ReconstructorState::Draining {
            return Err(Error::StreamClosed);
        }
        if frame.index != self.next_index {
            return Err(Error::OutOfOrderFrame {
                expected: self.next_index,
                got: frame.index,
            });
        }
        if frame.samples.len() != self.layout.frame_size {
            return Err(Error::InvalidConfiguration(format!(
                "synthesized frame {} has {} samples, expected {}",
                frame.index,
                frame.samples.len(),
                self.layout.frame_size
            )));
        }

        let start = frame.index * self.layout.hop_size as u64;
        let offset = (start - self.base) as usize;
        let needed = offset + self.layout.frame_size;
        if self.accumulator.len() < needed {
            self.accumulator.resize(needed, 0.0);
            self.weight.resize(needed, 0.0);
        }
        for (i, s) in frame.samples.iter().enumerate() {
            self.accumulator[offset + i] += s * self.synthesis[i];
            self.weight[offset + i] += self.frame_weight[i];
        }
        self.next_index += 1;

        // Later frames start at or after the next hop
        let complete_to = start + self.layout.hop_size as u64;
        Ok(self.emit_until(complete_to))
    }

    /// Flush the remaining samples so that exactly `expected_len` samples
    /// have been emitted in total.
    pub fn finish(&mut self, expected_len: u64) -> Vec<f32> {
        if self.state == ReconstructorState::Draining {
            return Vec::new();
        }
        self.state = ReconstructorState::Draining;
        if self.emitted > expected_len {
            warn!(
                emitted = self.emitted,
                expected_len, "reconstructor emitted past the expected length"
            );
            return Vec::new();
        }
        let out = self.emit_until(self.layout.padding() as u64 + expected_len);
        debug!(frames = self.next_index, samples = self.emitted, "overlap-add drained");
        out
    }

    fn emit_until(&mut self, end: u64) -> Vec<f32> {
        let padding = self.layout.padding() as u64;
        let floor = self.config.floor_fraction * self.steady;
        let mut out = Vec::with_capacity(end.saturating_sub(self.base) as usize);
        while self.base < end {
            let value = self.accumulator.pop_front().unwrap_or(0.0);
            let weight = self.weight.pop_front().unwrap_or(0.0);
            if self.base >= padding {
                let divisor = if self.config.normalize { weight.max(floor) } else { self.steady };
                out.push(value / divisor);
            }
            self.base += 1;
        }
        self.emitted += out.len() as u64;
        out
    }
}
