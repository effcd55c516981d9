//! Real-signal FFT helper over `rustfft`.
//!
//! Works with half spectra (`size / 2 + 1` bins); the inverse mirrors the
//! conjugate-symmetric half before transforming.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

pub type Complex32 = Complex<f32>;

/// Planned forward/inverse FFT pair for one transform size.
pub struct RealFft {
    size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex32>,
}

impl RealFft {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            size,
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
            buffer: vec![Complex32::new(0.0, 0.0); size],
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn num_bins(&self) -> usize {
        self.size / 2 + 1
    }

    /// Forward transform of `input` (zero-padded or truncated to `size`).
    pub fn forward(&mut self, input: &[f32]) -> Vec<Complex32> {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            *slot = Complex32::new(input.get(i).copied().unwrap_or(0.0), 0.0);
        }
        self.forward.process(&mut self.buffer);
        self.buffer[..self.num_bins()].to_vec()
    }

    /// Inverse transform of a half spectrum, scaled by `1 / size`.
    pub fn inverse(&mut self, half: &[Complex32]) -> Vec<f32> {
        let bins = self.num_bins();
        for k in 0..bins {
            self.buffer[k] = half.get(k).copied().unwrap_or_default();
        }
        // DC and Nyquist must be real for a real output
        self.buffer[0].im = 0.0;
        if self.size % 2 == 0 {
            self.buffer[bins - 1].im = 0.0;
        }
        for k in 1..self.size - bins + 1 {
            self.buffer[self.size - k] = self.buffer[k].conj();
        }
        self.inverse.process(&mut self.buffer);
        let scale = 1.0 / self.size as f32;
        self.buffer.iter().map(|c| c.re * scale).collect()
    }

    /// Hz between adjacent bins.
    pub fn bin_hz(&self, sample_rate: f32) -> f32 {
        sample_rate / self.size as f32
    }
}

impl std::fmt::Debug for RealFft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealFft").field("size", &self.size).finish()
    }
}
