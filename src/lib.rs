//! # voxmorph - Streaming Voice Transformation
//!
//! Phoneme-aware pitch, formant and duration modification of speech,
//! processed chunk by chunk with bounded latency.
//!
//! ## Architecture
//!
//! voxmorph is an umbrella crate that coordinates:
//! - **voxmorph-core** - Chunks, framing, phoneme timelines, parameters
//! - **voxmorph-dsp** - Frame denoisers (spectral gate, level gate)
//! - **voxmorph-analysis** - STFT and F0/envelope/aperiodicity analysis, spectrogram
//! - **voxmorph-transform** - Parameter transformation, resynthesis, overlap-add
//!
//! Data flows through the stages in strict sequence order:
//!
//! ```text
//! AudioChunk → FrameBuffer → Denoiser → SpectralAnalyzer
//!            → ParameterTransformer → SpectralSynthesizer → OverlapAddReconstructor
//! ```
//!
//! [`Pipeline`] runs every stage on the caller's thread; [`PipelineWorker`]
//! runs one thread per stage with bounded queues in between. Both produce
//! identical output.
//!
//! ## Quick Start
//!
//! ```
//! use voxmorph::prelude::*;
//!
//! let mut pipeline = Pipeline::builder()
//!     .sample_rate(16000)
//!     .mode(AnalysisMode::Decomposition)
//!     .pitch_shift(4.0)
//!     .formant_shift(1.1)
//!     .build()?;
//!
//! let chunk = AudioChunk::new(vec![0.0f32; 4000], 16000, 0, 0.0);
//! let mut output = pipeline.push_chunk(&chunk)?;
//! output.extend(pipeline.finish()?);
//! assert_eq!(output.len(), 4000);
//! # Ok::<(), voxmorph::Error>(())
//! ```

pub use voxmorph_analysis as analysis;
pub use voxmorph_core as core;
pub use voxmorph_dsp as dsp;
pub use voxmorph_transform as transform;

pub use voxmorph_analysis::{AnalysisMode, Spectrogram};
pub use voxmorph_core::{
    AudioChunk, ParameterOverride, PhonemeInterval, PhonemeOverrides, PhonemeTimeline,
    TransformParams, VoicePreset, WindowKind,
};
pub use voxmorph_dsp::DenoiserKind;

mod builder;
mod config;
mod engine;
mod error;
mod stages;
mod stats;
mod worker;

pub use builder::PipelineBuilder;
pub use config::PipelineConfig;
pub use engine::Pipeline;
pub use error::{Error, Result};
pub use stats::RunStats;
pub use worker::{PipelineEvent, PipelineWorker};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        AnalysisMode, AudioChunk, DenoiserKind, ParameterOverride, PhonemeInterval,
        PhonemeOverrides, PhonemeTimeline, Pipeline, PipelineBuilder, PipelineConfig,
        PipelineEvent, PipelineWorker, RunStats, TransformParams, VoicePreset,
    };
}
