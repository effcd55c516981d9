//! Forward analysis of frames into [`SpectralRepresentation`]s.
//!
//! [`SpectralAnalyzer`] dispatches to one of two implementations picked by
//! [`AnalysisMode`]:
//!
//! - [`StftAnalyzer`]: windowed FFT, magnitude and phase per bin.
//! - [`DecompositionAnalyzer`]: F0 (YIN tracker), spectral envelope
//!   (harmonic-peak or cepstral) and band aperiodicity.
//!
//! Decomposition failures never escape: the frame is replaced with a silent
//! unvoiced frame and a warning is logged.

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};
use voxmorph_core::{AnalysisFrame, Error, FrameLayout, Result, WindowKind};

use crate::aperiodicity::{estimate_aperiodicity, BandLayout};
use crate::envelope::{cepstral_envelope, harmonic_envelope, harmonic_peaks};
use crate::fft::RealFft;
use crate::pitch::{PitchTracker, PitchTrackerConfig};
use crate::representation::{SpectralRepresentation, StftFrame, VocoderFrame};

/// Which representation the analyzer produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Magnitude/phase. Lowest latency, best for formant-only changes.
    #[default]
    Stft,
    /// F0/envelope/aperiodicity. Needed for combined pitch, formant and
    /// duration changes.
    Decomposition,
}

/// Analyzer settings independent of frame layout and sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub mode: AnalysisMode,
    pub window: WindowKind,
    pub pitch: PitchTrackerConfig,
    /// Cepstral lifter cutoff in milliseconds of quefrency.
    pub cepstral_lifter_ms: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::Stft,
            window: WindowKind::Hann,
            pitch: PitchTrackerConfig::default(),
            cepstral_lifter_ms: 1.5,
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<()> {
        let p = &self.pitch;
        if !(p.min_f0 > 0.0 && p.max_f0 > p.min_f0 && p.max_f0.is_finite()) {
            return Err(Error::InvalidConfiguration(format!(
                "pitch range must satisfy 0 < min_f0 < max_f0 (got {}..{})",
                p.min_f0, p.max_f0
            )));
        }
        if !(self.cepstral_lifter_ms > 0.0 && self.cepstral_lifter_ms.is_finite()) {
            return Err(Error::InvalidConfiguration(format!(
                "cepstral lifter must be positive, got {} ms",
                self.cepstral_lifter_ms
            )));
        }
        Ok(())
    }
}

/// Number of cepstral coefficients kept for a lifter of `ms` at `sample_rate`.
pub fn lifter_coefficients(ms: f32, sample_rate: u32, frame_size: usize) -> usize {
    let n = (ms * 1e-3 * sample_rate as f32).round() as usize;
    n.clamp(1, (frame_size / 2).saturating_sub(1).max(1))
}

fn windowed(samples: &[f32], window: &[f32]) -> Vec<f32> {
    samples.iter().zip(window).map(|(s, w)| s * w).collect()
}

/// Magnitude/phase analyzer.
#[derive(Debug)]
pub struct StftAnalyzer {
    layout: FrameLayout,
    window: Vec<f32>,
    fft: RealFft,
}

impl StftAnalyzer {
    pub fn new(layout: FrameLayout, window: WindowKind) -> Self {
        Self {
            layout,
            window: window.coefficients(layout.frame_size),
            fft: RealFft::new(layout.frame_size),
        }
    }

    pub fn analyze(&mut self, frame: &AnalysisFrame) -> StftFrame {
        debug_assert_eq!(frame.len(), self.layout.frame_size);
        let spectrum = self.fft.forward(&windowed(&frame.samples, &self.window));
        StftFrame {
            index: frame.index,
            center_time: frame.center_time(),
            magnitude: spectrum.iter().map(|c| c.norm()).collect(),
            phase: spectrum.iter().map(|c| c.arg()).collect(),
            rms: frame.rms(),
        }
    }
}

/// F0/envelope/aperiodicity analyzer.
#[derive(Debug)]
pub struct DecompositionAnalyzer {
    layout: FrameLayout,
    sample_rate: u32,
    window: Vec<f32>,
    fft: RealFft,
    tracker: PitchTracker,
    bands: BandLayout,
    lifter: usize,
    recovered: u64,
}

impl DecompositionAnalyzer {
    pub fn new(layout: FrameLayout, sample_rate: u32, config: &AnalyzerConfig) -> Self {
        Self {
            layout,
            sample_rate,
            window: config.window.coefficients(layout.frame_size),
            fft: RealFft::new(layout.frame_size),
            tracker: PitchTracker::new(sample_rate, config.pitch),
            bands: BandLayout::new(sample_rate),
            lifter: lifter_coefficients(config.cepstral_lifter_ms, sample_rate, layout.frame_size),
            recovered: 0,
        }
    }

    pub fn bands(&self) -> &BandLayout {
        &self.bands
    }

    /// Frames replaced after a decomposition failure so far.
    pub fn recovered_frames(&self) -> u64 {
        self.recovered
    }

    pub fn analyze(&mut self, frame: &AnalysisFrame) -> VocoderFrame {
        match self.decompose(frame) {
            Ok(decomposed) => decomposed,
            Err(err) => {
                warn!(frame = frame.index, error = %err, "substituting silent unvoiced frame");
                self.recovered += 1;
                self.tracker.reset();
                VocoderFrame::silent(
                    frame.index,
                    frame.center_time(),
                    self.layout.num_bins(),
                    self.bands.num_bands(),
                )
            }
        }
    }

    /// Decompose one frame, failing on malformed input or numerical
    /// breakdown.
    pub fn decompose(&mut self, frame: &AnalysisFrame) -> Result<VocoderFrame> {
        if frame.len() != self.layout.frame_size {
            return Err(Error::DecompositionFailure(format!(
                "frame {} has {} samples, expected {}",
                frame.index,
                frame.len(),
                self.layout.frame_size
            )));
        }
        if let Some(pos) = frame.samples.iter().position(|s| !s.is_finite()) {
            return Err(Error::DecompositionFailure(format!(
                "frame {} has a non-finite sample at offset {pos}",
                frame.index
            )));
        }

        let rms = signal_rms(frame);
        let pitch = self.tracker.track(&frame.samples, rms);

        let spectrum = self.fft.forward(&windowed(&frame.samples, &self.window));
        let magnitude: Vec<f32> = spectrum.iter().map(|c| c.norm()).collect();
        let bin_hz = self.fft.bin_hz(self.sample_rate as f32);

        let peaks = if pitch.is_voiced() {
            harmonic_peaks(&magnitude, pitch.f0, bin_hz)
        } else {
            Vec::new()
        };
        let envelope = if peaks.len() >= 2 {
            harmonic_envelope(&peaks, magnitude.len(), bin_hz)
        } else {
            cepstral_envelope(&magnitude, self.lifter, &mut self.fft)
        };
        if envelope.iter().any(|v| !v.is_finite()) {
            return Err(Error::DecompositionFailure(format!(
                "envelope of frame {} is not finite",
                frame.index
            )));
        }

        let aperiodicity = if pitch.is_voiced() {
            estimate_aperiodicity(&magnitude, pitch.f0, bin_hz, &self.bands, 1.0 - pitch.confidence)
        } else {
            vec![1.0; self.bands.num_bands()]
        };

        trace!(frame = frame.index, f0 = pitch.f0, rms, "decomposed");

        Ok(VocoderFrame {
            index: frame.index,
            center_time: frame.center_time(),
            f0: pitch.f0,
            envelope,
            aperiodicity,
            rms,
            recovered: false,
        })
    }
}

/// RMS over the part of the frame that lies inside the input timeline.
fn signal_rms(frame: &AnalysisFrame) -> f32 {
    let skip = (-frame.start_sample).clamp(0, frame.len() as i64) as usize;
    let body = &frame.samples[skip..];
    if body.is_empty() {
        return 0.0;
    }
    (body.iter().map(|s| s * s).sum::<f32>() / body.len() as f32).sqrt()
}

/// Forward analyzer, one variant per [`AnalysisMode`].
#[derive(Debug)]
pub enum SpectralAnalyzer {
    Stft(StftAnalyzer),
    Decomposition(DecompositionAnalyzer),
}

impl SpectralAnalyzer {
    pub fn new(layout: FrameLayout, sample_rate: u32, config: &AnalyzerConfig) -> Result<Self> {
        layout.validate()?;
        config.validate()?;
        if sample_rate == 0 {
            return Err(Error::InvalidConfiguration(
                "sample rate must be positive".into(),
            ));
        }
        Ok(match config.mode {
            AnalysisMode::Stft => Self::Stft(StftAnalyzer::new(layout, config.window)),
            AnalysisMode::Decomposition => {
                Self::Decomposition(DecompositionAnalyzer::new(layout, sample_rate, config))
            }
        })
    }

    pub fn mode(&self) -> AnalysisMode {
        match self {
            Self::Stft(_) => AnalysisMode::Stft,
            Self::Decomposition(_) => AnalysisMode::Decomposition,
        }
    }

    pub fn analyze(&mut self, frame: &AnalysisFrame) -> SpectralRepresentation {
        match self {
            Self::Stft(a) => SpectralRepresentation::Stft(a.analyze(frame)),
            Self::Decomposition(a) => SpectralRepresentation::Vocoder(a.analyze(frame)),
        }
    }

    /// Band layout of decomposition frames, if any.
    pub fn bands(&self) -> Option<&BandLayout> {
        match self {
            Self::Stft(_) => None,
            Self::Decomposition(a) => Some(a.bands()),
        }
    }
}
