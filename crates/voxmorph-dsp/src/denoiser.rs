use serde::{Deserialize, Serialize};
use voxmorph_core::{AnalysisFrame, FrameLayout, Result};

use crate::level_gate::LevelGate;
use crate::spectral_gate::SpectralGate;

/// Noise reduction applied to each analysis frame before the transform.
///
/// Implementations keep per-stream state (noise estimates, gate level) and
/// must leave the frame length unchanged.
pub trait Denoiser: Send {
    fn name(&self) -> &'static str;

    /// Denoise `frame` in place.
    fn process(&mut self, frame: &mut AnalysisFrame);

    /// Forget all per-stream state.
    fn reset(&mut self);
}

/// Passes frames through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bypass;

impl Denoiser for Bypass {
    fn name(&self) -> &'static str {
        "bypass"
    }

    fn process(&mut self, _frame: &mut AnalysisFrame) {}

    fn reset(&mut self) {}
}

/// Serializable denoiser selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenoiserKind {
    #[default]
    Bypass,
    SpectralGate {
        /// Attenuation floor for gated bins, in dB (<= 0).
        reduction_db: f32,
        /// Multiple of the noise estimate subtracted from each bin.
        over_subtraction: f32,
    },
    LevelGate {
        threshold_db: f32,
        attack_secs: f32,
        hold_secs: f32,
        release_secs: f32,
        range_db: f32,
    },
}

impl DenoiserKind {
    /// Construct the selected denoiser for a stream.
    pub fn build(&self, layout: FrameLayout, sample_rate: u32) -> Result<Box<dyn Denoiser>> {
        Ok(match *self {
            DenoiserKind::Bypass => Box::new(Bypass),
            DenoiserKind::SpectralGate {
                reduction_db,
                over_subtraction,
            } => Box::new(
                SpectralGate::builder()
                    .reduction_db(reduction_db)
                    .over_subtraction(over_subtraction)
                    .build(layout)?,
            ),
            DenoiserKind::LevelGate {
                threshold_db,
                attack_secs,
                hold_secs,
                release_secs,
                range_db,
            } => Box::new(
                LevelGate::builder()
                    .threshold_db(threshold_db)
                    .attack_seconds(attack_secs)
                    .hold_seconds(hold_secs)
                    .release_seconds(release_secs)
                    .range_db(range_db)
                    .build(layout, sample_rate)?,
            ),
        })
    }
}
