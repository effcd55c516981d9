//! Test helpers and fixtures for voxmorph integration tests.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`]:
//! - `DSP_EPSILON` (1e-4): sample-level comparisons after FFT round-off
//! - `IDENTITY_ERROR_DB` (-60 dB): identity reconstruction
//! - `F0_TOLERANCE` (1%): measured fundamental after a pitch shift

#![allow(dead_code)]

pub mod tolerances;

use std::f32::consts::PI;

use voxmorph::analysis::metrics;
use voxmorph::analysis::{PitchDetector, RealFft};
use voxmorph::core::hann_window;

pub const TEST_SAMPLE_RATE: u32 = 16000;

/// Chunk length used to feed pipelines, deliberately not a multiple of the hop.
pub const TEST_CHUNK_LEN: usize = 1000;

/// Install a log subscriber once. Honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn generate_sine(frequency: f32, sample_rate: u32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| 0.5 * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Linear sweep from `start_hz` to `end_hz` at amplitude 0.5.
pub fn generate_sweep(
    start_hz: f32,
    end_hz: f32,
    sample_rate: u32,
    num_samples: usize,
) -> Vec<f32> {
    let duration = num_samples as f64 / sample_rate as f64;
    let rate = (end_hz - start_hz) as f64 / duration;
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let phase = 2.0 * std::f64::consts::PI * (start_hz as f64 * t + 0.5 * rate * t * t);
            (0.5 * phase.sin()) as f32
        })
        .collect()
}

/// Amplitude of a three-resonance vowel envelope at `freq`.
pub fn vowel_envelope(freq: f32, formants: &[f32]) -> f32 {
    formants
        .iter()
        .map(|&center| {
            let bandwidth = 80.0 + 0.05 * center;
            let x = (freq - center) / bandwidth;
            1.0 / (1.0 + x * x)
        })
        .sum()
}

/// Steady synthetic vowel: harmonics of `f0` shaped by formant resonances,
/// normalized to a peak near 0.5.
pub fn generate_vowel(f0: f32, formants: &[f32], sample_rate: u32, num_samples: usize) -> Vec<f32> {
    let nyquist = sample_rate as f32 / 2.0;
    let harmonics: Vec<(f32, f32)> = (1..)
        .map(|h| h as f32 * f0)
        .take_while(|&f| f < nyquist * 0.9)
        .map(|f| (f, vowel_envelope(f, formants)))
        .collect();
    let mut out: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            harmonics
                .iter()
                .map(|&(f, a)| a * (2.0 * PI * f * t).sin())
                .sum()
        })
        .collect();
    let peak = peak(&out);
    if peak > 0.0 {
        out.iter_mut().for_each(|s| *s *= 0.5 / peak);
    }
    out
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

pub fn rms(samples: &[f32]) -> f32 {
    metrics::rms(samples)
}

/// Median YIN estimate over `window`-sample blocks of `samples[start..end]`.
pub fn median_f0(
    samples: &[f32],
    sample_rate: u32,
    start: usize,
    end: usize,
    window: usize,
) -> f32 {
    let mut detector = PitchDetector::new(sample_rate);
    let mut estimates: Vec<f32> = samples[start..end]
        .chunks_exact(window)
        .map(|block| detector.detect(block).f0)
        .filter(|f0| *f0 > 0.0)
        .collect();
    if estimates.is_empty() {
        return 0.0;
    }
    estimates.sort_by(|a, b| a.total_cmp(b));
    estimates[estimates.len() / 2]
}

/// Power-weighted mean frequency of a Hann-windowed block.
pub fn spectral_centroid(block: &[f32], sample_rate: u32) -> f32 {
    let window = hann_window(block.len());
    let windowed: Vec<f32> = block.iter().zip(&window).map(|(s, w)| s * w).collect();
    let mut fft = RealFft::new(block.len());
    let bin_hz = fft.bin_hz(sample_rate as f32);
    let spectrum = fft.forward(&windowed);
    let mut weighted = 0.0f64;
    let mut total = 0.0f64;
    for (k, c) in spectrum.iter().enumerate() {
        let power = c.norm_sqr() as f64;
        weighted += power * k as f64 * bin_hz as f64;
        total += power;
    }
    if total == 0.0 {
        0.0
    } else {
        (weighted / total) as f32
    }
}

/// Assert relative error of `test` against `reference` is at most `max_db`.
pub fn assert_matches(reference: &[f32], test: &[f32], max_db: f32) {
    assert_eq!(reference.len(), test.len(), "length mismatch");
    let error = metrics::relative_error_db(reference, test);
    assert!(error <= max_db, "relative error {error:.1} dB above {max_db} dB");
}
