//! Pipeline configuration.
//!
//! One [`PipelineConfig`] governs one run. It is plain data with serde
//! derives so callers can load it however they like; [`validate`]
//! enforces every rule that would otherwise fail mid-stream.
//!
//! [`validate`]: PipelineConfig::validate

use serde::{Deserialize, Serialize};
use voxmorph_analysis::{AnalysisMode, AnalyzerConfig, PitchTrackerConfig};
use voxmorph_core::{Error, FrameLayout, PhonemeOverrides, TransformParams, WindowKind};
use voxmorph_dsp::DenoiserKind;
use voxmorph_transform::{ReconstructorConfig, TransformerConfig};

pub const DEFAULT_SAMPLE_RATE: u32 = 16000;
pub const DEFAULT_FRAME_SIZE: usize = 2048;
pub const DEFAULT_HOP_SIZE: usize = 512;
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;
pub const DEFAULT_SPECTROGRAM_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub hop_size: usize,
    pub mode: AnalysisMode,
    /// Global parameters, used wherever no phoneme override applies.
    pub params: TransformParams,
    pub overrides: PhonemeOverrides,
    /// Parameter crossfade in seconds. `None` is one hop.
    pub crossfade_secs: Option<f64>,
    pub denoiser: DenoiserKind,
    pub formant_ceiling_hz: Option<f32>,
    pub window: WindowKind,
    /// Divide overlap-add output by the accumulated window weight.
    pub normalize: bool,
    /// Weight floor as a fraction of the steady-state window weight.
    pub weight_floor: f32,
    pub pitch: PitchTrackerConfig,
    pub cepstral_lifter_ms: f32,
    pub record_spectrogram: bool,
    /// Maximum spectrogram columns kept; older ones are dropped.
    pub spectrogram_capacity: usize,
    /// Capacity of each stage queue in the threaded pipeline.
    pub queue_capacity: usize,
    /// Seed for vocoder noise excitation.
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            hop_size: DEFAULT_HOP_SIZE,
            mode: AnalysisMode::Stft,
            params: TransformParams::IDENTITY,
            overrides: PhonemeOverrides::default(),
            crossfade_secs: None,
            denoiser: DenoiserKind::Bypass,
            formant_ceiling_hz: None,
            window: WindowKind::Hann,
            normalize: true,
            weight_floor: 0.1,
            pitch: PitchTrackerConfig::default(),
            cepstral_lifter_ms: 1.5,
            record_spectrogram: false,
            spectrogram_capacity: DEFAULT_SPECTROGRAM_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            seed: 0,
        }
    }
}

impl PipelineConfig {
    pub fn layout(&self) -> voxmorph_core::Result<FrameLayout> {
        FrameLayout::new(self.frame_size, self.hop_size)
    }

    pub fn analyzer(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            mode: self.mode,
            window: self.window,
            pitch: self.pitch,
            cepstral_lifter_ms: self.cepstral_lifter_ms,
        }
    }

    pub fn transformer(&self) -> TransformerConfig {
        TransformerConfig {
            global: self.params,
            overrides: self.overrides.clone(),
            crossfade_secs: self.crossfade_secs,
            formant_ceiling_hz: self.formant_ceiling_hz,
            cepstral_lifter_ms: self.cepstral_lifter_ms,
        }
    }

    pub fn reconstructor(&self) -> ReconstructorConfig {
        ReconstructorConfig {
            analysis_window: self.window,
            synthesis_window: self.window,
            normalize: self.normalize,
            floor_fraction: self.weight_floor,
        }
    }

    /// Check every setting. Nothing is constructed.
    pub fn validate(&self) -> voxmorph_core::Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidConfiguration(
                "sample rate must be positive".into(),
            ));
        }
        self.layout()?;
        self.analyzer().validate()?;
        self.transformer().validate()?;
        self.reconstructor().validate()?;
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfiguration(
                "queue capacity must be at least 1".into(),
            ));
        }
        if self.record_spectrogram && self.spectrogram_capacity == 0 {
            return Err(Error::InvalidConfiguration(
                "spectrogram capacity must be at least 1 when recording".into(),
            ));
        }
        Ok(())
    }
}
