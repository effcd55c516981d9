//! Frame-level noise gate.

use voxmorph_analysis::metrics::{amplitude_to_db, db_to_amplitude};
use voxmorph_core::{AnalysisFrame, Error, FrameLayout, Result};

use crate::denoiser::Denoiser;

/// Gate driven by frame RMS.
///
/// Runs once per frame rather than per sample: attack and release are
/// one-pole smoothing of the gate level with coefficients derived from the
/// hop duration. Closed frames are attenuated to `range_db`, not muted.
#[derive(Debug, Clone)]
pub struct LevelGate {
    threshold_db: f32,
    range: f32,
    attack_coeff: f32,
    release_coeff: f32,
    hold_frames: u32,
    hold_counter: u32,
    gate_level: f32,
}

/// Smoothing coefficient for a time constant, stepped every `step_secs`.
#[inline]
fn time_to_coeff(time_secs: f32, step_secs: f32) -> f32 {
    if time_secs <= 0.0 {
        0.0
    } else {
        (-step_secs / time_secs).exp()
    }
}

impl LevelGate {
    pub fn builder() -> LevelGateBuilder {
        LevelGateBuilder::default()
    }

    pub fn is_open(&self) -> bool {
        self.gate_level > 0.5
    }

    pub fn gate_level(&self) -> f32 {
        self.gate_level
    }

    /// Gain applied to the current frame.
    pub fn gain(&self) -> f32 {
        self.range + self.gate_level * (1.0 - self.range)
    }
}

impl Denoiser for LevelGate {
    fn name(&self) -> &'static str {
        "level_gate"
    }

    fn process(&mut self, frame: &mut AnalysisFrame) {
        let level_db = amplitude_to_db(frame.rms(), 1.0, 120.0);

        if level_db >= self.threshold_db {
            self.hold_counter = self.hold_frames;
            self.gate_level = self.attack_coeff * self.gate_level + (1.0 - self.attack_coeff);
        } else if self.hold_counter > 0 {
            self.hold_counter -= 1;
        } else {
            self.gate_level *= self.release_coeff;
        }

        let gain = self.gain();
        frame.samples.iter_mut().for_each(|s| *s *= gain);
    }

    fn reset(&mut self) {
        self.gate_level = 0.0;
        self.hold_counter = 0;
    }
}

#[derive(Debug, Clone)]
pub struct LevelGateBuilder {
    threshold_db: f32,
    attack_seconds: f32,
    hold_seconds: f32,
    release_seconds: f32,
    range_db: f32,
}

impl Default for LevelGateBuilder {
    fn default() -> Self {
        Self {
            threshold_db: -45.0,
            attack_seconds: 0.005,
            hold_seconds: 0.05,
            release_seconds: 0.1,
            range_db: -30.0,
        }
    }
}

impl LevelGateBuilder {
    /// Frame RMS in dBFS at which the gate opens.
    pub fn threshold_db(mut self, db: f32) -> Self {
        self.threshold_db = db;
        self
    }

    pub fn attack_seconds(mut self, seconds: f32) -> Self {
        self.attack_seconds = seconds.max(0.0);
        self
    }

    pub fn hold_seconds(mut self, seconds: f32) -> Self {
        self.hold_seconds = seconds.max(0.0);
        self
    }

    pub fn release_seconds(mut self, seconds: f32) -> Self {
        self.release_seconds = seconds.max(0.0);
        self
    }

    /// Attenuation of a closed gate in dB (clamped to <= 0).
    pub fn range_db(mut self, db: f32) -> Self {
        self.range_db = db.min(0.0);
        self
    }

    pub fn build(self, layout: FrameLayout, sample_rate: u32) -> Result<LevelGate> {
        layout.validate()?;
        if sample_rate == 0 {
            return Err(Error::InvalidConfiguration(
                "sample rate must be positive".into(),
            ));
        }
        if !self.threshold_db.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "gate threshold must be finite, got {}",
                self.threshold_db
            )));
        }
        let hop_secs = layout.hop_secs(sample_rate) as f32;
        Ok(LevelGate {
            threshold_db: self.threshold_db,
            range: db_to_amplitude(self.range_db),
            attack_coeff: time_to_coeff(self.attack_seconds, hop_secs),
            release_coeff: time_to_coeff(self.release_seconds, hop_secs),
            hold_frames: (self.hold_seconds / hop_secs).round() as u32,
            hold_counter: 0,
            gate_level: 0.0,
        })
    }
}
