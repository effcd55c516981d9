//! Sequential pipeline: every stage runs on the caller's thread.

use tracing::{debug, info};
use voxmorph_analysis::Spectrogram;
use voxmorph_core::{AudioChunk, Error as CoreError, FrameLayout, PhonemeTimeline};
use voxmorph_transform::{OverlapAddReconstructor, SynthesizedFrame};

use crate::builder::PipelineBuilder;
use crate::config::PipelineConfig;
use crate::stages::{AnalysisStage, SynthesisStage};
use crate::stats::{RunStats, StatsRecorder};
use crate::Result;

/// Streaming voice transformation on the caller's thread.
///
/// Feed chunks in sequence order with [`push_chunk`](Self::push_chunk) and
/// collect the samples each call finalizes, then call
/// [`finish`](Self::finish) once to drain the tail. Output is at the input
/// sample rate and its total length is the input length mapped through the
/// time-stretch ratio.
///
/// # Example
///
/// ```
/// use voxmorph::prelude::*;
///
/// let mut pipeline = Pipeline::builder()
///     .sample_rate(16000)
///     .frame_size(1024)
///     .hop_size(256)
///     .time_stretch(0.8)
///     .build()?;
///
/// let input = vec![0.0f32; 16000];
/// let output = pipeline.process_all(&input, 4000)?;
/// assert_eq!(output.len(), 12800);
/// # Ok::<(), voxmorph::Error>(())
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    layout: FrameLayout,
    analysis: AnalysisStage,
    synthesis: SynthesisStage,
    reconstructor: OverlapAddReconstructor,
    output_stats: StatsRecorder,
    closed: bool,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Validate `config` and construct every stage.
    pub fn new(config: PipelineConfig, timeline: PhonemeTimeline) -> Result<Self> {
        config.validate()?;
        let layout = config.layout()?;
        let analysis = AnalysisStage::new(&config, layout)?;
        let synthesis = SynthesisStage::new(&config, layout, timeline, analysis.bands())?;
        let reconstructor = OverlapAddReconstructor::new(layout, config.reconstructor())?;

        debug!(
            sample_rate = config.sample_rate,
            frame_size = layout.frame_size,
            hop_size = layout.hop_size,
            mode = ?config.mode,
            params = ?config.params,
            "pipeline ready"
        );

        Ok(Self {
            output_stats: StatsRecorder::new(config.sample_rate),
            config,
            layout,
            analysis,
            synthesis,
            reconstructor,
            closed: false,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn is_finished(&self) -> bool {
        self.closed
    }

    /// Process one chunk and return the output samples it finalized.
    ///
    /// Configuration and ordering errors close the run; later calls fail
    /// with `StreamClosed`.
    pub fn push_chunk(&mut self, chunk: &AudioChunk) -> Result<Vec<f32>> {
        if self.closed {
            return Err(CoreError::StreamClosed.into());
        }
        let result = self.push_inner(chunk);
        if let Err(err) = &result {
            if err.is_stream_fatal() {
                self.closed = true;
            }
        }
        result
    }

    fn push_inner(&mut self, chunk: &AudioChunk) -> Result<Vec<f32>> {
        let mut output = Vec::new();
        for representation in self.analysis.push(chunk)? {
            let frames = self.synthesis.push(representation)?;
            self.reconstruct(frames, &mut output)?;
        }
        self.output_stats.record_output(&output);
        Ok(output)
    }

    /// End of input: drain every stage and return the remaining samples.
    pub fn finish(&mut self) -> Result<Vec<f32>> {
        if self.closed {
            return Err(CoreError::StreamClosed.into());
        }
        self.closed = true;

        let mut output = Vec::new();
        for representation in self.analysis.finish() {
            let frames = self.synthesis.push(representation)?;
            self.reconstruct(frames, &mut output)?;
        }
        let (frames, output_len) = self.synthesis.finish(self.analysis.total_input());
        self.reconstruct(frames, &mut output)?;
        output.extend(self.reconstructor.finish(output_len));
        self.output_stats.record_output(&output);

        let stats = self.stats();
        info!(
            input_secs = stats.input_secs(),
            output_secs = stats.output_secs(),
            frames = stats.frames_analyzed,
            recovered = stats.frames_recovered,
            "pipeline drained"
        );
        Ok(output)
    }

    fn reconstruct(&mut self, frames: Vec<SynthesizedFrame>, output: &mut Vec<f32>) -> Result<()> {
        self.output_stats.record_synthesized(frames.len());
        for frame in frames {
            output.extend(self.reconstructor.push(frame)?);
        }
        Ok(())
    }

    /// Split `samples` into chunks of `chunk_len`, run them all and drain.
    pub fn process_all(&mut self, samples: &[f32], chunk_len: usize) -> Result<Vec<f32>> {
        let mut output = Vec::with_capacity(samples.len());
        for chunk in AudioChunk::split(samples, self.config.sample_rate, chunk_len.max(1)) {
            output.extend(self.push_chunk(&chunk)?);
        }
        output.extend(self.finish()?);
        Ok(output)
    }

    pub fn stats(&self) -> RunStats {
        let mut stats = self.analysis.stats().clone();
        stats.merge(&self.output_stats);
        stats.snapshot()
    }

    /// Spectrogram of the analysis frames so far, when recording is on.
    pub fn spectrogram(&self) -> Option<Spectrogram> {
        self.analysis.spectrogram()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("layout", &self.layout)
            .field("mode", &self.config.mode)
            .field("closed", &self.closed)
            .finish()
    }
}
