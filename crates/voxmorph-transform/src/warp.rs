//! Frequency-axis resampling of envelopes and fine structure.

use std::f32::consts::PI;

const LOG_FLOOR: f32 = 1e-12;

/// Wrap a phase to `[-π, π]`.
#[inline]
pub fn wrap_phase(phase: f32) -> f32 {
    let mut p = phase;
    while p > PI {
        p -= 2.0 * PI;
    }
    while p < -PI {
        p += 2.0 * PI;
    }
    p
}

/// Linear interpolation of `values` at fractional index `pos`, clamped to
/// the ends.
#[inline]
pub fn sample_linear(values: &[f32], pos: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let last = values.len() - 1;
    if pos <= 0.0 {
        return values[0];
    }
    if pos >= last as f32 {
        return values[last];
    }
    let i = pos as usize;
    let t = pos - i as f32;
    values[i] + t * (values[i + 1] - values[i])
}

/// Interpolation in the log domain, for magnitudes.
#[inline]
pub fn sample_log(values: &[f32], pos: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let last = values.len() - 1;
    let pos = pos.clamp(0.0, last as f32);
    let i = (pos as usize).min(last);
    if i == last {
        return values[last];
    }
    let t = pos - i as f32;
    let a = values[i].max(LOG_FLOOR).ln();
    let b = values[i + 1].max(LOG_FLOOR).ln();
    (a + t * (b - a)).exp()
}

/// Envelope value at `freq` Hz.
#[inline]
pub fn envelope_at(envelope: &[f32], freq: f32, bin_hz: f32) -> f32 {
    sample_log(envelope, freq / bin_hz)
}

/// Formant warp `E'(f) = E(f / ratio)`.
///
/// With a ceiling, bins above it keep their original value and warp
/// sources are clamped to it.
pub fn warp_envelope(
    envelope: &[f32],
    ratio: f32,
    bin_hz: f32,
    ceiling_hz: Option<f32>,
) -> Vec<f32> {
    if (ratio - 1.0).abs() < 1e-6 {
        return envelope.to_vec();
    }
    let ceiling_bin = ceiling_hz.map(|hz| hz / bin_hz);
    envelope
        .iter()
        .enumerate()
        .map(|(k, &original)| {
            let k = k as f32;
            match ceiling_bin {
                Some(ceiling) if k > ceiling => original,
                Some(ceiling) => sample_log(envelope, (k / ratio).min(ceiling)),
                None => sample_log(envelope, k / ratio),
            }
        })
        .collect()
}

/// Move spectral fine structure from bin `k` to bin `k * ratio`.
///
/// Returns the remapped values and, for each target bin, the source bin it
/// was taken from (`None` above the source range).
pub fn remap_bins(values: &[f32], ratio: f32) -> (Vec<f32>, Vec<Option<usize>>) {
    let last = values.len().saturating_sub(1) as f32;
    let mut out = Vec::with_capacity(values.len());
    let mut sources = Vec::with_capacity(values.len());
    for k in 0..values.len() {
        let src = k as f32 / ratio;
        if src > last {
            out.push(0.0);
            sources.push(None);
        } else {
            out.push(sample_linear(values, src));
            sources.push(Some(src.round() as usize));
        }
    }
    (out, sources)
}
