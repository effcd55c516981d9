//! Parameter transformation between analysis and synthesis.
//!
//! [`ParameterTransformer`] consumes analysis frames in order and emits
//! output-timeline frames:
//!
//! - **Time map**: each output frame samples the analysis contours at a
//!   fractional source frame given by [`TimeMap`], interpolating between the
//!   two neighbouring analysis frames.
//! - **Phoneme overrides**: the phoneme covering the source position selects
//!   an override; changes are crossfaded by a [`ParameterRamp`].
//! - **Pitch and formant**: STFT frames are split into envelope and fine
//!   structure, the fine structure is moved by the pitch ratio and the
//!   envelope is warped by the formant ratio. Vocoder frames have F0 scaled
//!   and the envelope warped directly.
//!
//! STFT frames that land exactly on an analysis frame with no pitch change
//! keep the analysis phase, so identity parameters reproduce the input.

use std::collections::VecDeque;
use std::f32::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use voxmorph_analysis::envelope::cepstral_envelope;
use voxmorph_analysis::{
    lifter_coefficients, RealFft, SpectralRepresentation, StftFrame, VocoderFrame,
};
use voxmorph_core::{
    Error, FrameLayout, ParameterRamp, PhonemeOverrides, PhonemeTimeline, Result, TransformParams,
};

use crate::frame::{TransformedFrame, TransformedSpectrum};
use crate::time_map::TimeMap;
use crate::warp::{remap_bins, warp_envelope, wrap_phase};

/// What to change and how fast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    pub global: TransformParams,
    pub overrides: PhonemeOverrides,
    /// Crossfade between parameter sets in seconds. `None` is one hop,
    /// `Some(0.0)` switches immediately.
    pub crossfade_secs: Option<f64>,
    /// Envelope above this frequency is never warped.
    pub formant_ceiling_hz: Option<f32>,
    /// Cepstral lifter for STFT-mode envelope extraction.
    pub cepstral_lifter_ms: f32,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            global: TransformParams::IDENTITY,
            overrides: PhonemeOverrides::default(),
            crossfade_secs: None,
            formant_ceiling_hz: None,
            cepstral_lifter_ms: 1.5,
        }
    }
}

impl TransformerConfig {
    pub fn validate(&self) -> Result<()> {
        self.global.validate()?;
        self.overrides.validate(&self.global)?;
        if let Some(secs) = self.crossfade_secs {
            if !(secs >= 0.0 && secs.is_finite()) {
                return Err(Error::InvalidConfiguration(format!(
                    "crossfade must be a non-negative duration, got {secs} s"
                )));
            }
        }
        if let Some(hz) = self.formant_ceiling_hz {
            if !(hz > 0.0 && hz.is_finite()) {
                return Err(Error::InvalidConfiguration(format!(
                    "formant ceiling must be positive, got {hz} Hz"
                )));
            }
        }
        if !(self.cepstral_lifter_ms > 0.0 && self.cepstral_lifter_ms.is_finite()) {
            return Err(Error::InvalidConfiguration(format!(
                "cepstral lifter must be positive, got {} ms",
                self.cepstral_lifter_ms
            )));
        }
        Ok(())
    }
}

/// Phase-vocoder state for STFT frames.
#[derive(Debug)]
struct StftState {
    fft: RealFft,
    lifter: usize,
    phase: Vec<f32>,
    phase_valid: bool,
}

pub struct ParameterTransformer {
    layout: FrameLayout,
    sample_rate: u32,
    bin_hz: f32,
    config: TransformerConfig,
    timeline: PhonemeTimeline,
    ramp: ParameterRamp,
    time_map: TimeMap,
    history: VecDeque<SpectralRepresentation>,
    first_index: u64,
    next_input: u64,
    stft: StftState,
    finished: bool,
}

impl ParameterTransformer {
    pub fn new(
        layout: FrameLayout,
        sample_rate: u32,
        config: TransformerConfig,
        timeline: PhonemeTimeline,
    ) -> Result<Self> {
        layout.validate()?;
        config.validate()?;
        if sample_rate == 0 {
            return Err(Error::InvalidConfiguration(
                "sample rate must be positive".into(),
            ));
        }

        let hop_secs = layout.hop_secs(sample_rate);
        let crossfade_secs = config.crossfade_secs.unwrap_or(hop_secs);
        let ramp_frames = ParameterRamp::frames_for(crossfade_secs, hop_secs);
        debug!(
            global = ?config.global,
            overrides = config.overrides.len(),
            phonemes = timeline.len(),
            ramp_frames,
            "parameter transformer ready"
        );

        Ok(Self {
            layout,
            sample_rate,
            bin_hz: sample_rate as f32 / layout.frame_size as f32,
            ramp: ParameterRamp::new(config.global, ramp_frames),
            time_map: TimeMap::new(layout, config.global.time_stretch_ratio),
            stft: StftState {
                fft: RealFft::new(layout.frame_size),
                lifter: lifter_coefficients(
                    config.cepstral_lifter_ms,
                    sample_rate,
                    layout.frame_size,
                ),
                phase: vec![0.0; layout.num_bins()],
                phase_valid: false,
            },
            config,
            timeline,
            history: VecDeque::new(),
            first_index: 0,
            next_input: 0,
            finished: false,
        })
    }

    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    /// Output length in samples, known once [`finish`](Self::finish) ran.
    pub fn expected_output_len(&self) -> Option<u64> {
        self.time_map.output_len()
    }

    /// Parameters the overrides select at `time` seconds on the source
    /// timeline, before ramping.
    pub fn target_params(&self, time: f64) -> TransformParams {
        self.timeline
            .find(time)
            .and_then(|interval| self.config.overrides.get(&interval.label))
            .map(|o| o.apply_to(&self.config.global))
            .unwrap_or(self.config.global)
    }

    /// Accept the next analysis frame and return every output frame that
    /// can now be rendered.
    pub fn push(
        &mut self,
        representation: SpectralRepresentation,
    ) -> Result<Vec<TransformedFrame>> {
        if self.finished {
            return Err(Error::StreamClosed);
        }
        if representation.index() != self.next_input {
            return Err(Error::OutOfOrderFrame {
                expected: self.next_input,
                got: representation.index(),
            });
        }
        self.history.push_back(representation);
        self.next_input += 1;

        let mut out = Vec::new();
        while self.streaming_ready() {
            out.push(self.render_next());
        }
        self.prune();
        Ok(out)
    }

    /// End of input: render the remaining output frames for an input of
    /// `input_len` samples.
    pub fn finish(&mut self, input_len: u64) -> Vec<TransformedFrame> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        self.time_map.set_input_len(input_len);

        let mut out = Vec::new();
        while !self.history.is_empty() && !self.time_map.is_complete() {
            out.push(self.render_next());
        }
        debug!(
            output_frames = self.time_map.next_frame(),
            output_len = ?self.time_map.output_len(),
            "transformer drained"
        );
        out
    }

    /// The next output frame can be rendered without knowing where the
    /// input ends.
    fn streaming_ready(&self) -> bool {
        let Some(last) = self.next_input.checked_sub(1) else {
            return false;
        };
        let last_start = last as f64 * self.layout.hop_size as f64 - self.layout.padding() as f64;
        let source = self.time_map.source_frame();
        let whole = source.floor() as u64;
        let available = whole < last || (source == source.floor() && whole <= last);
        available && self.time_map.input_position() <= last_start
    }

    fn prune(&mut self) {
        let keep_from = (self.time_map.source_frame().floor() as u64).saturating_sub(1);
        while self.first_index < keep_from && self.history.len() > 1 {
            self.history.pop_front();
            self.first_index += 1;
        }
    }

    fn frame_at(
        history: &VecDeque<SpectralRepresentation>,
        first: u64,
        index: u64,
    ) -> Option<&SpectralRepresentation> {
        index
            .checked_sub(first)
            .and_then(|offset| history.get(offset as usize))
    }

    fn render_next(&mut self) -> TransformedFrame {
        let index = self.time_map.next_frame();
        let position = self.time_map.input_position();
        let source_time = position / self.sample_rate as f64;

        let target = self.target_params(source_time);
        self.ramp.set_target(target);
        let params = self.ramp.next_frame();

        let last = self.next_input.saturating_sub(1);
        let first = self.first_index;
        let source = self.time_map.source_frame().min(last as f64);
        let whole = (source.floor() as u64).clamp(first, last);
        let frac = if whole >= last {
            0.0
        } else {
            (source - whole as f64).clamp(0.0, 1.0) as f32
        };

        let spectrum = match Self::frame_at(&self.history, first, whole) {
            Some(SpectralRepresentation::Stft(a)) => {
                let next = match Self::frame_at(&self.history, first, whole + 1) {
                    Some(SpectralRepresentation::Stft(b)) => Some(b),
                    _ => None,
                };
                let prev = whole
                    .checked_sub(1)
                    .and_then(|i| Self::frame_at(&self.history, first, i));
                let prev = match prev {
                    Some(SpectralRepresentation::Stft(p)) => Some(p),
                    _ => None,
                };
                render_stft(
                    &mut self.stft,
                    a,
                    next,
                    prev,
                    frac,
                    &params,
                    &self.config,
                    self.layout,
                    self.bin_hz,
                )
            }
            Some(SpectralRepresentation::Vocoder(a)) => {
                let next = match Self::frame_at(&self.history, first, whole + 1) {
                    Some(SpectralRepresentation::Vocoder(b)) => Some(b),
                    _ => None,
                };
                render_vocoder(a, next, frac, &params, self.config.formant_ceiling_hz, self.bin_hz)
            }
            None => TransformedSpectrum::Stft {
                magnitude: vec![0.0; self.layout.num_bins()],
                phase: vec![0.0; self.layout.num_bins()],
            },
        };

        trace!(index, source, ?params, "transformed frame");
        self.time_map.advance(params.time_stretch_ratio);

        TransformedFrame {
            index,
            source_frame: source,
            source_time,
            params,
            spectrum,
        }
    }
}

impl std::fmt::Debug for ParameterTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterTransformer")
            .field("layout", &self.layout)
            .field("sample_rate", &self.sample_rate)
            .field("next_input", &self.next_input)
            .field("next_output", &self.time_map.next_frame())
            .field("finished", &self.finished)
            .finish()
    }
}

fn lerp_vec(a: &[f32], b: &[f32], t: f32) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| x + (y - x) * t).collect()
}

/// Per-bin instantaneous frequency in radians per sample from the phase
/// advance between two frames one hop apart.
fn instantaneous_frequency(from: &[f32], to: &[f32], size: usize, hop: usize) -> Vec<f32> {
    from.iter()
        .zip(to)
        .enumerate()
        .map(|(k, (p0, p1))| {
            let expected = 2.0 * PI * k as f32 * hop as f32 / size as f32;
            (expected + wrap_phase(p1 - p0 - expected)) / hop as f32
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn render_stft(
    state: &mut StftState,
    a: &StftFrame,
    next: Option<&StftFrame>,
    prev: Option<&StftFrame>,
    frac: f32,
    params: &TransformParams,
    config: &TransformerConfig,
    layout: FrameLayout,
    bin_hz: f32,
) -> TransformedSpectrum {
    let exact = frac <= 1e-6 || next.is_none();
    let shifting = params.pitch_shift_semitones.abs() >= 1e-4;
    let warping = (params.formant_shift_ratio - 1.0).abs() >= 1e-5;

    let source_magnitude = match next {
        Some(b) if !exact => lerp_vec(&a.magnitude, &b.magnitude, frac),
        _ => a.magnitude.clone(),
    };

    let (magnitude, sources) = if shifting || warping {
        let envelope = cepstral_envelope(&source_magnitude, state.lifter, &mut state.fft);
        let fine: Vec<f32> = source_magnitude
            .iter()
            .zip(&envelope)
            .map(|(m, e)| if *e > 1e-20 { m / e } else { 0.0 })
            .collect();
        let (fine, sources) = if shifting {
            let (remapped, sources) = remap_bins(&fine, params.pitch_ratio());
            (remapped, Some(sources))
        } else {
            (fine, None)
        };
        let envelope = warp_envelope(
            &envelope,
            params.formant_shift_ratio,
            bin_hz,
            config.formant_ceiling_hz,
        );
        let magnitude = fine.iter().zip(&envelope).map(|(f, e)| f * e).collect();
        (magnitude, sources)
    } else {
        (source_magnitude, None)
    };

    // Phase passthrough keeps identity and formant-only frames exact
    if exact && !shifting {
        state.phase.copy_from_slice(&a.phase);
        state.phase_valid = true;
        return TransformedSpectrum::Stft {
            magnitude,
            phase: a.phase.clone(),
        };
    }

    if !state.phase_valid {
        state.phase.copy_from_slice(&a.phase);
        state.phase_valid = true;
    } else {
        let (size, hop) = (layout.frame_size, layout.hop_size);
        let omega = match (next, prev) {
            (Some(b), _) => instantaneous_frequency(&a.phase, &b.phase, size, hop),
            (None, Some(p)) => instantaneous_frequency(&p.phase, &a.phase, size, hop),
            (None, None) => (0..a.phase.len())
                .map(|k| 2.0 * PI * k as f32 / size as f32)
                .collect(),
        };
        let ratio = params.pitch_ratio();
        for (k, acc) in state.phase.iter_mut().enumerate() {
            let w = match &sources {
                Some(sources) => match sources[k] {
                    Some(src) => omega[src.min(omega.len() - 1)] * ratio,
                    None => 2.0 * PI * k as f32 / size as f32,
                },
                None => omega[k],
            };
            *acc = wrap_phase(*acc + w * hop as f32);
        }
    }

    TransformedSpectrum::Stft {
        magnitude,
        phase: state.phase.clone(),
    }
}

fn render_vocoder(
    a: &VocoderFrame,
    next: Option<&VocoderFrame>,
    frac: f32,
    params: &TransformParams,
    ceiling_hz: Option<f32>,
    bin_hz: f32,
) -> TransformedSpectrum {
    let (f0, envelope, aperiodicity, rms) = match next {
        Some(b) if frac > 1e-6 => {
            let nearest = if frac < 0.5 { a } else { b };
            if a.recovered || b.recovered {
                (nearest.f0, nearest.envelope.clone(), nearest.aperiodicity.clone(), nearest.rms)
            } else {
                let f0 = if a.is_voiced() && b.is_voiced() {
                    (a.f0.ln() + (b.f0.ln() - a.f0.ln()) * frac).exp()
                } else {
                    nearest.f0
                };
                (
                    f0,
                    lerp_vec(&a.envelope, &b.envelope, frac),
                    lerp_vec(&a.aperiodicity, &b.aperiodicity, frac),
                    a.rms + (b.rms - a.rms) * frac,
                )
            }
        }
        _ => (a.f0, a.envelope.clone(), a.aperiodicity.clone(), a.rms),
    };

    TransformedSpectrum::Vocoder {
        f0: if f0 > 0.0 { f0 * params.pitch_ratio() } else { 0.0 },
        envelope: warp_envelope(&envelope, params.formant_shift_ratio, bin_hz, ceiling_hz),
        aperiodicity,
        rms,
    }
}
