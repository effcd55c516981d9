//! Builder for configuring and constructing a [`Pipeline`] or
//! [`PipelineWorker`].

use voxmorph_analysis::AnalysisMode;
use voxmorph_core::{
    Error as CoreError, PhonemeInterval, PhonemeOverrides, PhonemeTimeline, TransformParams,
    VoicePreset,
};
use voxmorph_dsp::DenoiserKind;

use crate::config::PipelineConfig;
use crate::worker::PipelineWorker;
use crate::{Pipeline, Result};

/// Phoneme intervals are optional. Without them every frame uses the
/// global parameters.
///
/// # Example
///
/// ```
/// use voxmorph::prelude::*;
///
/// let pipeline = Pipeline::builder()
///     .mode(AnalysisMode::Decomposition)
///     .preset(VoicePreset::MaleToFemale)
///     .phonemes(vec![PhonemeInterval::new("AA", 0.2, 0.4)])
///     .override_for("AA", ParameterOverride::formant(1.2))
///     .build()?;
/// assert_eq!(pipeline.config().params.pitch_shift_semitones, 8.0);
/// # Ok::<(), voxmorph::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    phonemes: Vec<PhonemeInterval>,
}

impl PipelineBuilder {
    /// Start from an existing configuration.
    pub fn from_config(config: PipelineConfig) -> Self {
        Self {
            config,
            phonemes: Vec::new(),
        }
    }

    /// Default: 16000
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 2048
    pub fn frame_size(mut self, frame_size: usize) -> Self {
        self.config.frame_size = frame_size;
        self
    }

    /// Default: 512. At most half the frame size.
    pub fn hop_size(mut self, hop_size: usize) -> Self {
        self.config.hop_size = hop_size;
        self
    }

    /// Default: [`AnalysisMode::Stft`]
    pub fn mode(mut self, mode: AnalysisMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn params(mut self, params: TransformParams) -> Self {
        self.config.params = params;
        self
    }

    pub fn pitch_shift(mut self, semitones: f32) -> Self {
        self.config.params.pitch_shift_semitones = semitones;
        self
    }

    pub fn formant_shift(mut self, ratio: f32) -> Self {
        self.config.params.formant_shift_ratio = ratio;
        self
    }

    pub fn time_stretch(mut self, ratio: f32) -> Self {
        self.config.params.time_stretch_ratio = ratio;
        self
    }

    /// Replace the global parameters with a preset's.
    pub fn preset(mut self, preset: VoicePreset) -> Self {
        self.config.params = preset.params();
        self
    }

    pub fn overrides(mut self, overrides: PhonemeOverrides) -> Self {
        self.config.overrides = overrides;
        self
    }

    pub fn override_for(
        mut self,
        label: impl Into<String>,
        value: voxmorph_core::ParameterOverride,
    ) -> Self {
        self.config.overrides.insert(label, value);
        self
    }

    /// Use the built-in vowel table scaled by `multiplier` as overrides.
    pub fn vowel_softening(mut self, multiplier: f32) -> Self {
        self.config.overrides = PhonemeOverrides::vowel_softening(multiplier);
        self
    }

    pub fn phonemes(mut self, intervals: Vec<PhonemeInterval>) -> Self {
        self.phonemes = intervals;
        self
    }

    /// `0.0` switches parameters immediately. Default: one hop.
    pub fn crossfade_secs(mut self, secs: f64) -> Self {
        self.config.crossfade_secs = Some(secs);
        self
    }

    pub fn denoiser(mut self, denoiser: DenoiserKind) -> Self {
        self.config.denoiser = denoiser;
        self
    }

    pub fn formant_ceiling_hz(mut self, hz: f32) -> Self {
        self.config.formant_ceiling_hz = Some(hz);
        self
    }

    /// Keep up to `capacity` spectrogram columns.
    pub fn record_spectrogram(mut self, capacity: usize) -> Self {
        self.config.record_spectrogram = true;
        self.config.spectrogram_capacity = capacity;
        self
    }

    /// Default: 16
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn timeline(&self) -> std::result::Result<PhonemeTimeline, CoreError> {
        if self.phonemes.is_empty() {
            Ok(PhonemeTimeline::empty())
        } else {
            PhonemeTimeline::new(self.phonemes.clone())
        }
    }

    /// Validate and build a sequential pipeline.
    pub fn build(self) -> Result<Pipeline> {
        let timeline = self.timeline()?;
        Pipeline::new(self.config, timeline)
    }

    /// Validate and start a pipeline with one thread per stage.
    pub fn spawn(self) -> Result<PipelineWorker> {
        let timeline = self.timeline()?;
        PipelineWorker::spawn(self.config, timeline)
    }
}
