//! # voxmorph-transform
//!
//! Everything between analysis frames and output samples:
//!
//! - **Transformer**: time map, phoneme overrides, pitch and formant changes
//! - **Synthesizers**: inverse FFT for STFT frames, harmonic-plus-noise for
//!   vocoder frames
//! - **Reconstructor**: weighted overlap-add with window-sum normalization
//!
//! ## Example
//!
//! ```rust
//! use voxmorph_core::{FrameLayout, PhonemeTimeline, TransformParams};
//! use voxmorph_transform::{ParameterTransformer, TransformerConfig};
//!
//! let layout = FrameLayout::new(1024, 256).unwrap();
//! let config = TransformerConfig {
//!     global: TransformParams::new().pitch_shift(3.0),
//!     ..Default::default()
//! };
//! let timeline = PhonemeTimeline::empty();
//! let transformer = ParameterTransformer::new(layout, 16000, config, timeline).unwrap();
//! assert_eq!(transformer.expected_output_len(), None);
//! ```

mod frame;
mod reconstructor;
mod synthesizer;
mod time_map;
mod transformer;
pub mod warp;

pub use frame::{SynthesizedFrame, TransformedFrame, TransformedSpectrum};
pub use reconstructor::{OverlapAddReconstructor, ReconstructorConfig, ReconstructorState};
pub use synthesizer::{SpectralSynthesizer, StftSynthesizer, VocoderSynthesizer};
pub use time_map::TimeMap;
pub use transformer::{ParameterTransformer, TransformerConfig};
