//! Analysis and synthesis windows.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Window shape applied before the forward transform and again before
/// overlap-add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowKind {
    /// Periodic Hann window. Squared, it sums to a constant at 75% overlap.
    #[default]
    Hann,
    /// No tapering. Only useful for diagnostics.
    Rectangular,
}

impl WindowKind {
    /// Build the window coefficients for a frame of `size` samples.
    pub fn coefficients(&self, size: usize) -> Vec<f32> {
        match self {
            WindowKind::Hann => hann_window(size),
            WindowKind::Rectangular => vec![1.0; size],
        }
    }
}

/// Periodic Hann window (denominator `size`, not `size - 1`).
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Steady-state sum of `analysis[n] * synthesis[n]` over all frames covering
/// one output sample when frames advance by `hop`.
///
/// This is the value the overlap-add normalizer converges to away from the
/// stream edges.
pub fn overlap_gain(analysis: &[f32], synthesis: &[f32], hop: usize) -> f32 {
    let size = analysis.len().min(synthesis.len());
    if size == 0 || hop == 0 {
        return 0.0;
    }
    // Average over one hop, positions are otherwise equivalent for COLA windows.
    let mut total = 0.0f32;
    for offset in 0..hop {
        let mut sum = 0.0f32;
        let mut n = offset;
        while n < size {
            sum += analysis[n] * synthesis[n];
            n += hop;
        }
        total += sum;
    }
    total / hop as f32
}
