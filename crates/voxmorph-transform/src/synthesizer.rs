//! Transformed frames back to time-domain frames.
//!
//! Both synthesizers return frames in the analysis-window domain: an STFT
//! frame's inverse transform already carries the analysis window, and a
//! vocoder frame is multiplied by it after generation. The overlap-add
//! reconstructor applies the synthesis window and normalizes.

use std::f32::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;
use voxmorph_analysis::fft::Complex32;
use voxmorph_analysis::{BandLayout, RealFft};
use voxmorph_core::{FrameLayout, WindowKind};

use crate::frame::{SynthesizedFrame, TransformedFrame, TransformedSpectrum};
use crate::warp::{envelope_at, wrap_phase};

/// Reference fundamental for noise level on unvoiced frames.
const UNVOICED_REFERENCE_HZ: f32 = 100.0;

/// Inverse FFT of magnitude and phase.
#[derive(Debug)]
pub struct StftSynthesizer {
    fft: RealFft,
}

impl StftSynthesizer {
    pub fn new(layout: FrameLayout) -> Self {
        Self {
            fft: RealFft::new(layout.frame_size),
        }
    }

    pub fn synthesize(&mut self, magnitude: &[f32], phase: &[f32]) -> Vec<f32> {
        let spectrum: Vec<Complex32> = magnitude
            .iter()
            .zip(phase)
            .map(|(m, p)| Complex32::from_polar(*m, *p))
            .collect();
        self.fft.inverse(&spectrum)
    }
}

/// Harmonic-plus-noise generator for vocoder frames.
///
/// Harmonic `h` is a sinusoid at `h * f0` with amplitude read from the
/// envelope, weighted by `sqrt(1 - aperiodicity)`. Noise is shaped by the
/// envelope and `sqrt(aperiodicity)`. Harmonic phases carry across frames
/// so voiced segments stay continuous; the frame is then scaled to the
/// analyzed RMS.
#[derive(Debug)]
pub struct VocoderSynthesizer {
    layout: FrameLayout,
    sample_rate: f32,
    bin_hz: f32,
    bands: BandLayout,
    window: Vec<f32>,
    fft: RealFft,
    harmonic_phase: Vec<f32>,
    rng: StdRng,
}

impl VocoderSynthesizer {
    pub fn new(
        layout: FrameLayout,
        sample_rate: u32,
        window: WindowKind,
        bands: BandLayout,
        seed: u64,
    ) -> Self {
        Self {
            layout,
            sample_rate: sample_rate as f32,
            bin_hz: sample_rate as f32 / layout.frame_size as f32,
            bands,
            window: window.coefficients(layout.frame_size),
            fft: RealFft::new(layout.frame_size),
            harmonic_phase: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn synthesize(
        &mut self,
        f0: f32,
        envelope: &[f32],
        aperiodicity: &[f32],
        rms: f32,
    ) -> Vec<f32> {
        let size = self.layout.frame_size;
        if rms <= 0.0 || !rms.is_finite() {
            self.harmonic_phase.clear();
            return vec![0.0; size];
        }

        let mut frame = if f0 > 0.0 {
            self.harmonics(f0, envelope, aperiodicity)
        } else {
            self.harmonic_phase.clear();
            vec![0.0; size]
        };
        let reference = if f0 > 0.0 { f0 } else { UNVOICED_REFERENCE_HZ };
        for (s, n) in frame.iter_mut().zip(self.noise(reference, envelope, aperiodicity)) {
            *s += n;
        }

        let level = (frame.iter().map(|s| s * s).sum::<f32>() / size as f32).sqrt();
        let gain = if level > 1e-12 { rms / level } else { 0.0 };
        for (s, w) in frame.iter_mut().zip(&self.window) {
            *s *= gain * w;
        }
        frame
    }

    fn harmonics(&mut self, f0: f32, envelope: &[f32], aperiodicity: &[f32]) -> Vec<f32> {
        let size = self.layout.frame_size;
        let nyquist = self.sample_rate / 2.0;
        let count = ((nyquist / f0).ceil() as usize).saturating_sub(1);
        self.harmonic_phase.resize(count, 0.0);

        let center = size as f32 / 2.0;
        let advance = 2.0 * PI * f0 * self.layout.hop_size as f32 / self.sample_rate;
        let mut frame = vec![0.0f32; size];
        for (i, phase) in self.harmonic_phase.iter_mut().enumerate() {
            let h = (i + 1) as f32;
            let freq = h * f0;
            let periodic = (1.0 - self.bands.interpolate(aperiodicity, freq)).clamp(0.0, 1.0);
            let amplitude =
                envelope_at(envelope, freq, self.bin_hz) * 4.0 / size as f32 * periodic.sqrt();
            if amplitude > 0.0 {
                let omega = 2.0 * PI * freq / self.sample_rate;
                for (n, s) in frame.iter_mut().enumerate() {
                    *s += amplitude * (*phase + omega * (n as f32 - center)).cos();
                }
            }
            *phase = wrap_phase(*phase + advance * h);
        }
        frame
    }

    fn noise(&mut self, reference: f32, envelope: &[f32], aperiodicity: &[f32]) -> Vec<f32> {
        let density = (self.bin_hz / reference).sqrt();
        let spectrum: Vec<Complex32> = envelope
            .iter()
            .enumerate()
            .map(|(k, e)| {
                let share = self
                    .bands
                    .interpolate(aperiodicity, k as f32 * self.bin_hz)
                    .clamp(0.0, 1.0);
                let magnitude = 2.0 * e * (share * density * density).sqrt();
                let theta = self.rng.gen_range(-PI..PI);
                Complex32::from_polar(magnitude, theta)
            })
            .collect();
        self.fft.inverse(&spectrum)
    }
}

/// Synthesizer for the frame kind the analyzer produces.
#[derive(Debug)]
pub enum SpectralSynthesizer {
    Stft(StftSynthesizer),
    Vocoder(VocoderSynthesizer),
}

impl SpectralSynthesizer {
    pub fn synthesize(&mut self, frame: &TransformedFrame) -> SynthesizedFrame {
        let samples = match (&frame.spectrum, &mut *self) {
            (TransformedSpectrum::Stft { magnitude, phase }, Self::Stft(s)) => {
                s.synthesize(magnitude, phase)
            }
            (
                TransformedSpectrum::Vocoder {
                    f0,
                    envelope,
                    aperiodicity,
                    rms,
                },
                Self::Vocoder(s),
            ) => s.synthesize(*f0, envelope, aperiodicity, *rms),
            (_, synth) => {
                trace!(
                    index = frame.index,
                    "frame kind does not match synthesizer, emitting silence"
                );
                vec![0.0; synth.frame_size()]
            }
        };
        SynthesizedFrame {
            index: frame.index,
            samples,
        }
    }

    fn frame_size(&self) -> usize {
        match self {
            Self::Stft(s) => s.fft.size(),
            Self::Vocoder(s) => s.layout.frame_size,
        }
    }
}
