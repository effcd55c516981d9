//! # voxmorph-analysis
//!
//! Forward analysis for the voxmorph pipeline:
//!
//! - **STFT analysis**: windowed FFT into magnitude and phase
//! - **Pitch tracking**: YIN with a voicing gate and jump handling
//! - **Spectral envelopes**: harmonic-peak and cepstral estimators
//! - **Aperiodicity**: per-band noise share relative to the harmonic grid
//! - **Spectrogram**: capped dB history for diagnostics
//! - **Metrics**: RMS, relative error, hop-boundary discontinuity
//!
//! ## Example
//!
//! ```rust
//! use voxmorph_analysis::{AnalysisMode, AnalyzerConfig, SpectralAnalyzer};
//! use voxmorph_core::{AnalysisFrame, FrameLayout};
//!
//! let layout = FrameLayout::new(1024, 256).unwrap();
//! let config = AnalyzerConfig { mode: AnalysisMode::Decomposition, ..Default::default() };
//! let mut analyzer = SpectralAnalyzer::new(layout, 16000, &config).unwrap();
//!
//! let frame = AnalysisFrame {
//!     index: 0,
//!     start_sample: 0,
//!     sample_rate: 16000,
//!     samples: vec![0.0; 1024],
//! };
//! let rep = analyzer.analyze(&frame);
//! assert_eq!(rep.voiced(), Some(false));
//! ```

pub mod aperiodicity;
pub mod envelope;
pub mod fft;
pub mod metrics;
pub mod pitch;
pub mod spectrogram;

mod analyzer;
mod representation;

pub use analyzer::{
    lifter_coefficients, AnalysisMode, AnalyzerConfig, DecompositionAnalyzer, SpectralAnalyzer,
    StftAnalyzer,
};
pub use aperiodicity::BandLayout;
pub use fft::RealFft;
pub use pitch::{PitchDetector, PitchEstimate, PitchTracker, PitchTrackerConfig};
pub use representation::{SpectralRepresentation, StftFrame, VocoderFrame};
pub use spectrogram::{Spectrogram, SpectrogramRecorder};
