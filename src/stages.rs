//! The three pipeline stages.
//!
//! Each stage exclusively owns its state: the analysis stage holds the
//! framer carry and the denoiser's filter state, the synthesis stage holds
//! the transformer history and phase accumulators, and the reconstructor
//! holds the overlap-add tail. [`Pipeline`](crate::Pipeline) runs them in
//! sequence on one thread; [`PipelineWorker`](crate::PipelineWorker) gives
//! each its own thread.

use tracing::trace;
use voxmorph_analysis::{
    AnalysisMode, BandLayout, SpectralAnalyzer, SpectralRepresentation, Spectrogram,
    SpectrogramRecorder,
};
use voxmorph_core::{AudioChunk, Error, FrameBuffer, FrameLayout, PhonemeTimeline, Result};
use voxmorph_dsp::Denoiser;
use voxmorph_transform::{
    ParameterTransformer, SpectralSynthesizer, StftSynthesizer, SynthesizedFrame,
    VocoderSynthesizer,
};

use crate::config::PipelineConfig;
use crate::stats::StatsRecorder;

/// Framing, denoising and forward analysis.
pub(crate) struct AnalysisStage {
    sample_rate: u32,
    framer: FrameBuffer,
    denoiser: Box<dyn Denoiser>,
    analyzer: SpectralAnalyzer,
    spectrogram: Option<SpectrogramRecorder>,
    stats: StatsRecorder,
}

impl AnalysisStage {
    pub fn new(config: &PipelineConfig, layout: FrameLayout) -> Result<Self> {
        let spectrogram = config.record_spectrogram.then(|| {
            SpectrogramRecorder::new(
                config.sample_rate as f32 / layout.frame_size as f32,
                config.spectrogram_capacity,
            )
        });
        Ok(Self {
            sample_rate: config.sample_rate,
            framer: FrameBuffer::new(layout)?,
            denoiser: config.denoiser.build(layout, config.sample_rate)?,
            analyzer: SpectralAnalyzer::new(layout, config.sample_rate, &config.analyzer())?,
            spectrogram,
            stats: StatsRecorder::new(config.sample_rate),
        })
    }

    pub fn push(&mut self, chunk: &AudioChunk) -> Result<Vec<SpectralRepresentation>> {
        if chunk.sample_rate() != self.sample_rate {
            return Err(Error::SampleRateMismatch {
                expected: self.sample_rate,
                got: chunk.sample_rate(),
            });
        }
        let frames = self.framer.push(chunk)?;
        self.stats.record_input(chunk.samples());
        trace!(sequence = chunk.sequence(), frames = frames.len(), "chunk framed");
        Ok(self.analyze(frames))
    }

    pub fn finish(&mut self) -> Vec<SpectralRepresentation> {
        let frames = self.framer.finish();
        self.analyze(frames)
    }

    fn analyze(
        &mut self,
        frames: Vec<voxmorph_core::AnalysisFrame>,
    ) -> Vec<SpectralRepresentation> {
        frames
            .into_iter()
            .map(|mut frame| {
                self.denoiser.process(&mut frame);
                let representation = self.analyzer.analyze(&frame);
                self.stats.record_analysis(&representation);
                if let Some(recorder) = self.spectrogram.as_mut() {
                    recorder.record(&representation);
                }
                representation
            })
            .collect()
    }

    pub fn total_input(&self) -> u64 {
        self.framer.total_input()
    }

    pub fn bands(&self) -> Option<BandLayout> {
        self.analyzer.bands().cloned()
    }

    pub fn spectrogram(&self) -> Option<Spectrogram> {
        self.spectrogram.as_ref().map(SpectrogramRecorder::snapshot)
    }

    pub fn stats(&self) -> &StatsRecorder {
        &self.stats
    }
}

/// Parameter transformation and inverse transform.
pub(crate) struct SynthesisStage {
    transformer: ParameterTransformer,
    synthesizer: SpectralSynthesizer,
}

impl SynthesisStage {
    pub fn new(
        config: &PipelineConfig,
        layout: FrameLayout,
        timeline: PhonemeTimeline,
        bands: Option<BandLayout>,
    ) -> Result<Self> {
        let synthesizer = match config.mode {
            AnalysisMode::Stft => SpectralSynthesizer::Stft(StftSynthesizer::new(layout)),
            AnalysisMode::Decomposition => SpectralSynthesizer::Vocoder(VocoderSynthesizer::new(
                layout,
                config.sample_rate,
                config.window,
                bands.unwrap_or_else(|| BandLayout::new(config.sample_rate)),
                config.seed,
            )),
        };
        Ok(Self {
            transformer: ParameterTransformer::new(
                layout,
                config.sample_rate,
                config.transformer(),
                timeline,
            )?,
            synthesizer,
        })
    }

    pub fn push(
        &mut self,
        representation: SpectralRepresentation,
    ) -> Result<Vec<SynthesizedFrame>> {
        let frames = self.transformer.push(representation)?;
        Ok(frames.iter().map(|f| self.synthesizer.synthesize(f)).collect())
    }

    /// Remaining frames and the final output length.
    pub fn finish(&mut self, input_len: u64) -> (Vec<SynthesizedFrame>, u64) {
        let frames = self
            .transformer
            .finish(input_len)
            .iter()
            .map(|f| self.synthesizer.synthesize(f))
            .collect();
        (frames, self.transformer.expected_output_len().unwrap_or(0))
    }
}
