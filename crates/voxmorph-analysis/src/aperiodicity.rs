//! Band aperiodicity: the share of a band's energy that does not sit on
//! the harmonic grid of the current F0.

use std::sync::Arc;

/// Interior band edges in Hz. Bands run from 0 Hz to Nyquist.
pub const DEFAULT_BAND_EDGES_HZ: [f32; 4] = [1000.0, 2000.0, 4000.0, 6000.0];

/// Bins within this distance of a harmonic count as periodic energy
/// (the Hann main-lobe half width).
const HARMONIC_HALF_WIDTH: f32 = 2.0;

/// Lower bound so that even a clean tone keeps a trace of breath noise.
pub const MIN_APERIODICITY: f32 = 0.001;

/// Frequency bands used for aperiodicity, 0 Hz to Nyquist.
#[derive(Debug, Clone, PartialEq)]
pub struct BandLayout {
    edges: Arc<[f32]>,
}

impl BandLayout {
    /// Default bands clipped to the Nyquist frequency of `sample_rate`.
    pub fn new(sample_rate: u32) -> Self {
        Self::with_edges(sample_rate, &DEFAULT_BAND_EDGES_HZ)
    }

    pub fn with_edges(sample_rate: u32, interior: &[f32]) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        let mut edges = vec![0.0];
        edges.extend(interior.iter().copied().filter(|&e| e > 0.0 && e < nyquist));
        edges.push(nyquist);
        Self {
            edges: edges.into(),
        }
    }

    #[inline]
    pub fn num_bands(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn edges(&self) -> &[f32] {
        &self.edges
    }

    /// Band containing `freq` (clamped to the outer bands).
    pub fn band_of(&self, freq: f32) -> usize {
        let idx = self.edges[1..self.edges.len() - 1].partition_point(|&e| e <= freq);
        idx.min(self.num_bands() - 1)
    }

    pub fn center(&self, band: usize) -> f32 {
        0.5 * (self.edges[band] + self.edges[band + 1])
    }

    /// Per-band values interpolated linearly between band centers.
    pub fn interpolate(&self, values: &[f32], freq: f32) -> f32 {
        let n = values.len().min(self.num_bands());
        if n == 0 {
            return 1.0;
        }
        if freq <= self.center(0) {
            return values[0];
        }
        for b in 0..n - 1 {
            let (c0, c1) = (self.center(b), self.center(b + 1));
            if freq <= c1 {
                let t = (freq - c0) / (c1 - c0);
                return values[b] + t * (values[b + 1] - values[b]);
            }
        }
        values[n - 1]
    }
}

/// Per-band aperiodicity of a magnitude spectrum with fundamental `f0`.
///
/// Energy within the main lobe of a harmonic is periodic; the rest is
/// noise. The noise share is normalized by the share white noise would
/// have so a fully aperiodic band reads 1. When the harmonic spacing is
/// too tight to separate lobes, every band gets `fallback`.
pub fn estimate_aperiodicity(
    magnitude: &[f32],
    f0: f32,
    bin_hz: f32,
    bands: &BandLayout,
    fallback: f32,
) -> Vec<f32> {
    let num_bands = bands.num_bands();
    if f0 <= 0.0 {
        return vec![1.0; num_bands];
    }
    let spacing = f0 / bin_hz;
    if spacing < 2.0 * HARMONIC_HALF_WIDTH + 1.0 {
        return vec![fallback.clamp(MIN_APERIODICITY, 1.0); num_bands];
    }

    let mut total = vec![0.0f64; num_bands];
    let mut off_grid = vec![0.0f64; num_bands];
    let mut bins = vec![0usize; num_bands];
    let mut off_bins = vec![0usize; num_bands];

    for (k, &m) in magnitude.iter().enumerate().skip(1) {
        let band = bands.band_of(k as f32 * bin_hz);
        let nearest = (k as f32 / spacing).round();
        let on_grid = nearest >= 1.0 && (k as f32 - nearest * spacing).abs() <= HARMONIC_HALF_WIDTH;
        let power = (m as f64) * (m as f64);

        total[band] += power;
        bins[band] += 1;
        if !on_grid {
            off_grid[band] += power;
            off_bins[band] += 1;
        }
    }

    (0..num_bands)
        .map(|b| {
            if total[b] <= 1e-20 || off_bins[b] == 0 {
                return if off_bins[b] == 0 { fallback } else { 1.0 };
            }
            let expected = off_bins[b] as f64 / bins[b] as f64;
            ((off_grid[b] / total[b]) / expected) as f32
        })
        .map(|ap| ap.clamp(MIN_APERIODICITY, 1.0))
        .collect()
}
