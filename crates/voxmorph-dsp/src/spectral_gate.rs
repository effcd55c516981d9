//! Adaptive spectral subtraction.

use voxmorph_analysis::fft::{Complex32, RealFft};
use voxmorph_analysis::metrics::db_to_amplitude;
use voxmorph_core::{AnalysisFrame, Error, FrameLayout, Result};

use crate::denoiser::Denoiser;

/// Spectral gate with a per-bin adaptive noise floor.
///
/// The noise estimate follows each bin's magnitude down quickly and up
/// slowly, so it settles on the quiet parts of the signal. Each bin is then
/// reduced by `over_subtraction` times the estimate, but never below the
/// spectral floor set by `reduction_db`. Phase is preserved.
#[derive(Debug)]
pub struct SpectralGate {
    fft: RealFft,
    noise: Vec<f32>,
    primed: bool,
    floor: f32,
    over_subtraction: f32,
    fall_rate: f32,
    rise_rate: f32,
}

impl SpectralGate {
    pub fn builder() -> SpectralGateBuilder {
        SpectralGateBuilder::default()
    }

    pub fn noise_estimate(&self) -> &[f32] {
        &self.noise
    }

    fn update_noise(&mut self, magnitude: &[f32]) {
        if !self.primed {
            self.noise.copy_from_slice(magnitude);
            self.primed = true;
            return;
        }
        for (n, &m) in self.noise.iter_mut().zip(magnitude) {
            let rate = if m < *n { self.fall_rate } else { self.rise_rate };
            *n += (m - *n) * rate;
        }
    }
}

impl Denoiser for SpectralGate {
    fn name(&self) -> &'static str {
        "spectral_gate"
    }

    fn process(&mut self, frame: &mut AnalysisFrame) {
        if frame.len() != self.fft.size() {
            return;
        }
        let spectrum = self.fft.forward(&frame.samples);
        let magnitude: Vec<f32> = spectrum.iter().map(|c| c.norm()).collect();
        self.update_noise(&magnitude);

        let cleaned: Vec<Complex32> = spectrum
            .iter()
            .zip(&magnitude)
            .zip(&self.noise)
            .map(|((&c, &m), &n)| {
                if m <= 0.0 {
                    return c;
                }
                let target = (m - self.over_subtraction * n).max(self.floor * m);
                c * (target / m)
            })
            .collect();

        frame.samples = self.fft.inverse(&cleaned);
    }

    fn reset(&mut self) {
        self.noise.iter_mut().for_each(|n| *n = 0.0);
        self.primed = false;
    }
}

#[derive(Debug, Clone)]
pub struct SpectralGateBuilder {
    reduction_db: f32,
    over_subtraction: f32,
    fall_rate: f32,
    rise_rate: f32,
}

impl Default for SpectralGateBuilder {
    fn default() -> Self {
        Self {
            reduction_db: -20.0,
            over_subtraction: 1.5,
            fall_rate: 0.5,
            rise_rate: 0.02,
        }
    }
}

impl SpectralGateBuilder {
    /// Maximum attenuation in dB (clamped to <= 0).
    pub fn reduction_db(mut self, db: f32) -> Self {
        self.reduction_db = db.min(0.0);
        self
    }

    pub fn over_subtraction(mut self, factor: f32) -> Self {
        self.over_subtraction = factor;
        self
    }

    /// Per-frame smoothing rates of the noise estimate when the bin falls
    /// below it and when it rises above it.
    pub fn adaptation(mut self, fall_rate: f32, rise_rate: f32) -> Self {
        self.fall_rate = fall_rate;
        self.rise_rate = rise_rate;
        self
    }

    pub fn build(self, layout: FrameLayout) -> Result<SpectralGate> {
        layout.validate()?;
        if !(self.over_subtraction >= 0.0 && self.over_subtraction.is_finite()) {
            return Err(Error::InvalidConfiguration(format!(
                "over-subtraction must be non-negative, got {}",
                self.over_subtraction
            )));
        }
        let in_unit = |r: f32| r > 0.0 && r <= 1.0;
        if !in_unit(self.fall_rate) || !in_unit(self.rise_rate) {
            return Err(Error::InvalidConfiguration(format!(
                "noise adaptation rates must be in (0, 1], got {} / {}",
                self.fall_rate, self.rise_rate
            )));
        }
        Ok(SpectralGate {
            fft: RealFft::new(layout.frame_size),
            noise: vec![0.0; layout.num_bins()],
            primed: false,
            floor: db_to_amplitude(self.reduction_db),
            over_subtraction: self.over_subtraction,
            fall_rate: self.fall_rate,
            rise_rate: self.rise_rate,
        })
    }
}
