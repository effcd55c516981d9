//! # voxmorph-core
//!
//! Plain data and streaming primitives shared by every voxmorph stage:
//!
//! - [`AudioChunk`] / [`AnalysisFrame`] - input blocks and fixed-size frames
//! - [`FrameLayout`] / [`FrameBuffer`] - validated framing with bounded carry
//! - [`PhonemeTimeline`] - read-only phoneme interval lookup
//! - [`TransformParams`], [`PhonemeOverrides`], [`VoicePreset`] - what to change
//! - [`ParameterRamp`] - linear crossfade between parameter sets
//! - [`WindowKind`] - analysis/synthesis windows

mod chunk;
mod error;
mod frame_buffer;
mod params;
mod phoneme;
mod ramp;
pub mod window;

pub use chunk::{AnalysisFrame, AudioChunk};
pub use error::{Error, Result};
pub use frame_buffer::{FrameBuffer, FrameLayout, Frames};
pub use params::{ParameterOverride, PhonemeOverrides, TransformParams, VoicePreset};
pub use phoneme::{PhonemeInterval, PhonemeTimeline};
pub use ramp::ParameterRamp;
pub use window::{hann_window, overlap_gain, WindowKind};
