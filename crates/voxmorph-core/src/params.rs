//! Transformation parameters, per-phoneme overrides and voice presets.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pitch, formant and duration settings for a run or a segment of one.
///
/// ## Semantics
///
/// - `pitch_shift_semitones`: signed, F0 is multiplied by `2^(st/12)`
/// - `formant_shift_ratio`: envelope warp, `> 1` raises formants, `1.0` = unchanged
/// - `time_stretch_ratio`: output duration / input duration, `1.0` = unchanged
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformParams {
    pub pitch_shift_semitones: f32,
    pub formant_shift_ratio: f32,
    pub time_stretch_ratio: f32,
}

impl TransformParams {
    /// Parameters that leave the signal untouched.
    pub const IDENTITY: TransformParams = TransformParams {
        pitch_shift_semitones: 0.0,
        formant_shift_ratio: 1.0,
        time_stretch_ratio: 1.0,
    };

    pub fn new() -> Self {
        Self::IDENTITY
    }

    pub fn pitch_shift(mut self, semitones: f32) -> Self {
        self.pitch_shift_semitones = semitones;
        self
    }

    pub fn formant_shift(mut self, ratio: f32) -> Self {
        self.formant_shift_ratio = ratio;
        self
    }

    pub fn time_stretch(mut self, ratio: f32) -> Self {
        self.time_stretch_ratio = ratio;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.pitch_shift_semitones.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "pitch shift must be finite, got {}",
                self.pitch_shift_semitones
            )));
        }
        if !(self.formant_shift_ratio.is_finite() && self.formant_shift_ratio > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "formant shift ratio must be positive, got {}",
                self.formant_shift_ratio
            )));
        }
        if !(self.time_stretch_ratio.is_finite() && self.time_stretch_ratio > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "time stretch ratio must be positive, got {}",
                self.time_stretch_ratio
            )));
        }
        Ok(())
    }

    /// F0 multiplier: `2^(semitones / 12)`.
    #[inline]
    pub fn pitch_ratio(&self) -> f32 {
        2.0_f32.powf(self.pitch_shift_semitones / 12.0)
    }

    pub fn is_identity(&self) -> bool {
        self.pitch_shift_semitones.abs() < 1e-4
            && (self.formant_shift_ratio - 1.0).abs() < 1e-5
            && (self.time_stretch_ratio - 1.0).abs() < 1e-6
    }

    /// Linear blend, `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(&self, other: &TransformParams, t: f32) -> TransformParams {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: f32, b: f32| a + (b - a) * t;
        TransformParams {
            pitch_shift_semitones: mix(self.pitch_shift_semitones, other.pitch_shift_semitones),
            formant_shift_ratio: mix(self.formant_shift_ratio, other.formant_shift_ratio),
            time_stretch_ratio: mix(self.time_stretch_ratio, other.time_stretch_ratio),
        }
    }
}

impl Default for TransformParams {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Partial parameter set applied on top of the global parameters while a
/// matching phoneme is active. Unset fields fall back to the global values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_shift_semitones: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formant_shift_ratio: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stretch_ratio: Option<f32>,
}

impl ParameterOverride {
    pub fn formant(ratio: f32) -> Self {
        Self {
            formant_shift_ratio: Some(ratio),
            ..Self::default()
        }
    }

    pub fn pitch(semitones: f32) -> Self {
        Self {
            pitch_shift_semitones: Some(semitones),
            ..Self::default()
        }
    }

    pub fn stretch(ratio: f32) -> Self {
        Self {
            time_stretch_ratio: Some(ratio),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, global: &TransformParams) -> TransformParams {
        TransformParams {
            pitch_shift_semitones: self
                .pitch_shift_semitones
                .unwrap_or(global.pitch_shift_semitones),
            formant_shift_ratio: self.formant_shift_ratio.unwrap_or(global.formant_shift_ratio),
            time_stretch_ratio: self.time_stretch_ratio.unwrap_or(global.time_stretch_ratio),
        }
    }
}

/// Relative formant movement per IPA vowel used by the accent softening table.
/// `> 1` moves the vowel's formants up, `< 1` down.
const VOWEL_SHIFTS: [(&str, f32); 15] = [
    ("i", 1.10),
    ("ɪ", 1.05),
    ("e", 1.08),
    ("ɛ", 1.00),
    ("æ", 0.95),
    ("ɑ", 0.90),
    ("ɒ", 0.92),
    ("ɔ", 0.95),
    ("o", 1.00),
    ("ʊ", 0.97),
    ("u", 0.93),
    ("ʌ", 1.05),
    ("ə", 1.00),
    ("ɚ", 1.00),
    ("ɝ", 1.00),
];

/// Phoneme label to parameter override mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhonemeOverrides {
    map: HashMap<String, ParameterOverride>,
}

impl PhonemeOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in vowel softening table with every ratio scaled by `multiplier`.
    pub fn vowel_softening(multiplier: f32) -> Self {
        let map = VOWEL_SHIFTS
            .iter()
            .map(|(label, ratio)| {
                (
                    label.to_string(),
                    ParameterOverride::formant(ratio * multiplier),
                )
            })
            .collect();
        Self { map }
    }

    pub fn with(mut self, label: impl Into<String>, value: ParameterOverride) -> Self {
        self.insert(label, value);
        self
    }

    pub fn insert(&mut self, label: impl Into<String>, value: ParameterOverride) {
        self.map.insert(label.into(), value);
    }

    pub fn get(&self, label: &str) -> Option<&ParameterOverride> {
        self.map.get(label)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Every override, applied to `global`, must itself be valid.
    pub fn validate(&self, global: &TransformParams) -> Result<()> {
        for (label, value) in &self.map {
            value.apply_to(global).validate().map_err(|err| match err {
                Error::InvalidConfiguration(msg) => {
                    Error::InvalidConfiguration(format!("override for '{}': {}", label, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

/// Ready-made voice character changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoicePreset {
    MaleToFemale,
    FemaleToMale,
    Older,
    Younger,
}

impl VoicePreset {
    pub fn params(&self) -> TransformParams {
        match self {
            VoicePreset::MaleToFemale => {
                TransformParams::new().pitch_shift(8.0).formant_shift(1.15)
            }
            VoicePreset::FemaleToMale => {
                TransformParams::new().pitch_shift(-8.0).formant_shift(0.88)
            }
            // Older speech is slower: playback rate 0.85
            VoicePreset::Older => {
                TransformParams::new().pitch_shift(-2.0).time_stretch(1.0 / 0.85)
            }
            VoicePreset::Younger => {
                TransformParams::new().pitch_shift(3.0).time_stretch(1.0 / 1.15)
            }
        }
    }
}
