//! Frame-level denoisers run between framing and analysis.
//!
//! Every denoiser implements [`Denoiser`]: it rewrites one frame in place
//! and never changes its length. [`DenoiserKind`] is the serializable
//! selection used by pipeline configuration.

mod denoiser;
mod level_gate;
mod spectral_gate;

pub use denoiser::{Bypass, Denoiser, DenoiserKind};
pub use level_gate::{LevelGate, LevelGateBuilder};
pub use spectral_gate::{SpectralGate, SpectralGateBuilder};
