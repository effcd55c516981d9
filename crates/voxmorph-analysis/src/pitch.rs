//! Fundamental-frequency estimation with the YIN algorithm
//! (de Cheveigné & Kawahara, 2002), plus a frame-to-frame tracker that
//! makes the voicing decision and rejects implausible jumps.
//!
//! ## Algorithm
//!
//! 1. **Difference function** - d(τ) = Σ(x[j] - x[j+τ])²
//! 2. **Cumulative mean normalized difference** - d'(τ)
//! 3. **Absolute threshold** - first local minimum with d'(τ) < threshold
//! 4. **Parabolic interpolation** - sub-sample period
//!
//! Direct O(n × max_period) evaluation; analysis frames are short enough
//! that the FFT formulation has not been worth it.

use serde::{Deserialize, Serialize};

/// Per-frame F0 estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    /// Fundamental in Hz, 0.0 when unvoiced.
    pub f0: f32,
    /// 1 - d'(τ) at the chosen period, clamped to [0, 1].
    pub confidence: f32,
}

impl PitchEstimate {
    pub const UNVOICED: Self = Self {
        f0: 0.0,
        confidence: 0.0,
    };

    #[inline]
    pub fn is_voiced(&self) -> bool {
        self.f0 > 0.0
    }
}

/// YIN pitch detector with pre-allocated work buffers.
#[derive(Debug, Clone)]
pub struct PitchDetector {
    sample_rate: f32,
    min_f0: f32,
    max_f0: f32,
    threshold: f32,
    difference: Vec<f32>,
    normalized: Vec<f32>,
}

impl PitchDetector {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_range(sample_rate, 60.0, 500.0)
    }

    /// Detector limited to `[min_f0, max_f0]` Hz.
    pub fn with_range(sample_rate: u32, min_f0: f32, max_f0: f32) -> Self {
        let sample_rate = sample_rate as f32;
        let max_period = (sample_rate / min_f0.max(1.0)) as usize;
        Self {
            sample_rate,
            min_f0,
            max_f0,
            threshold: 0.1,
            difference: vec![0.0; max_period + 2],
            normalized: vec![0.0; max_period + 2],
        }
    }

    /// Absolute threshold on d'(τ), clamped to 0.01..=0.5.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(0.01, 0.5);
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Shortest frame that can resolve `min_f0`.
    pub fn min_frame_len(&self) -> usize {
        (self.sample_rate / self.min_f0.max(1.0)) as usize * 2
    }

    /// Estimate F0 of one frame of raw (unwindowed) samples.
    pub fn detect(&mut self, samples: &[f32]) -> PitchEstimate {
        let min_period = ((self.sample_rate / self.max_f0) as usize).max(2);
        let max_period = ((self.sample_rate / self.min_f0.max(1.0)) as usize)
            .min(samples.len() / 2)
            .min(self.difference.len() - 2);

        if max_period <= min_period + 1 {
            return PitchEstimate::UNVOICED;
        }

        self.difference_function(samples, max_period);
        self.cumulative_mean_normalize(max_period);

        let Some((tau, aperiodicity)) = self.best_period(min_period, max_period) else {
            return PitchEstimate::UNVOICED;
        };

        let period = self.refine(tau, max_period);
        if period <= 0.0 {
            return PitchEstimate::UNVOICED;
        }

        PitchEstimate {
            f0: self.sample_rate / period as f32,
            confidence: (1.0 - aperiodicity).clamp(0.0, 1.0),
        }
    }

    fn difference_function(&mut self, samples: &[f32], max_period: usize) {
        let window = max_period;

        let mut cum_sq = Vec::with_capacity(samples.len() + 1);
        cum_sq.push(0.0f64);
        for &s in samples {
            let last = cum_sq[cum_sq.len() - 1];
            cum_sq.push(last + (s as f64) * (s as f64));
        }
        let energy = |start: usize| cum_sq[(start + window).min(samples.len())] - cum_sq[start];

        // d(τ) = e(0) + e(τ) - 2 r(τ)
        let e0 = energy(0);
        self.difference[0] = 0.0;
        for tau in 1..=max_period {
            let mut r = 0.0f64;
            for j in 0..window.min(samples.len() - tau) {
                r += samples[j] as f64 * samples[j + tau] as f64;
            }
            self.difference[tau] = (e0 + energy(tau) - 2.0 * r).max(0.0) as f32;
        }
    }

    fn cumulative_mean_normalize(&mut self, max_period: usize) {
        self.normalized[0] = 1.0;
        let mut running = 0.0f32;
        for tau in 1..=max_period {
            running += self.difference[tau];
            self.normalized[tau] = if running > 1e-10 {
                self.difference[tau] * tau as f32 / running
            } else {
                1.0
            };
        }
    }

    /// First dip below threshold, walked down to its local minimum. Taking
    /// the first rather than the global minimum avoids subharmonic picks.
    fn best_period(&self, min_period: usize, max_period: usize) -> Option<(usize, f32)> {
        let d = &self.normalized;
        let mut tau = min_period;
        while tau < max_period {
            if d[tau] < self.threshold {
                while tau + 1 < max_period && d[tau + 1] < d[tau] {
                    tau += 1;
                }
                return Some((tau, d[tau]));
            }
            tau += 1;
        }

        // Nothing under threshold: accept a clear global minimum
        let (best_tau, best) = (min_period..=max_period)
            .map(|t| (t, d[t]))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        (best < 0.5).then_some((best_tau, best))
    }

    fn refine(&self, tau: usize, max_period: usize) -> f64 {
        if tau < 1 || tau >= max_period {
            return tau as f64;
        }
        let s0 = self.normalized[tau - 1] as f64;
        let s1 = self.normalized[tau] as f64;
        let s2 = self.normalized[tau + 1] as f64;
        let denominator = 2.0 * (2.0 * s1 - s2 - s0);
        if denominator.abs() > 1e-10 {
            tau as f64 + (s2 - s0) / denominator
        } else {
            tau as f64
        }
    }
}

/// Settings for [`PitchTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchTrackerConfig {
    pub min_f0: f32,
    pub max_f0: f32,
    /// YIN absolute threshold.
    pub threshold: f32,
    /// Frames quieter than this RMS are unvoiced.
    pub silence_rms: f32,
    /// Minimum confidence for a voiced decision.
    pub min_confidence: f32,
    /// Strength of the confidence penalty for jumps beyond a major third.
    pub jump_penalty: f32,
    /// Frames to hold the previous F0 across a rejected jump.
    pub max_hold_frames: u32,
}

impl Default for PitchTrackerConfig {
    fn default() -> Self {
        Self {
            min_f0: 60.0,
            max_f0: 500.0,
            threshold: 0.1,
            silence_rms: 1e-3,
            min_confidence: 0.5,
            jump_penalty: 2.0,
            max_hold_frames: 2,
        }
    }
}

/// Frame-by-frame F0 tracker.
///
/// Wraps [`PitchDetector`] with an energy gate, a confidence floor and a
/// jump penalty: a voiced frame more than a major third away from its
/// voiced predecessor loses confidence, and if that drops it under the
/// floor the previous F0 is held for a few frames instead.
#[derive(Debug, Clone)]
pub struct PitchTracker {
    detector: PitchDetector,
    config: PitchTrackerConfig,
    previous: Option<f32>,
    held: u32,
}

impl PitchTracker {
    pub fn new(sample_rate: u32, config: PitchTrackerConfig) -> Self {
        let mut detector = PitchDetector::with_range(sample_rate, config.min_f0, config.max_f0);
        detector.set_threshold(config.threshold);
        Self {
            detector,
            config,
            previous: None,
            held: 0,
        }
    }

    pub fn config(&self) -> &PitchTrackerConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.held = 0;
    }

    /// Track one raw frame. `rms` is the frame's RMS level.
    pub fn track(&mut self, samples: &[f32], rms: f32) -> PitchEstimate {
        if rms < self.config.silence_rms {
            self.reset();
            return PitchEstimate::UNVOICED;
        }

        let raw = self.detector.detect(samples);
        if !raw.is_voiced() || raw.confidence < self.config.min_confidence {
            self.reset();
            return PitchEstimate::UNVOICED;
        }

        let Some(previous) = self.previous else {
            self.previous = Some(raw.f0);
            return raw;
        };

        let confidence = raw.confidence * jump_weight(raw.f0 / previous, self.config.jump_penalty);
        if confidence >= self.config.min_confidence {
            self.previous = Some(raw.f0);
            self.held = 0;
            return PitchEstimate { confidence, ..raw };
        }

        if self.held < self.config.max_hold_frames {
            self.held += 1;
            return PitchEstimate {
                f0: previous,
                confidence,
            };
        }

        // Jump persisted: accept the new contour
        self.previous = Some(raw.f0);
        self.held = 0;
        raw
    }
}

/// Confidence multiplier for a frame-to-frame F0 ratio.
fn jump_weight(ratio: f32, penalty: f32) -> f32 {
    // ln(1.26) ≈ 0.23, a major third
    if (0.79..=1.26).contains(&ratio) {
        return 1.0;
    }
    let cost = (ratio.ln().abs() / 0.23 - 1.0).max(0.0);
    (-penalty * cost).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::f32::consts::PI;

    fn sine(sample_rate: u32, freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn rms(x: &[f32]) -> f32 {
        (x.iter().map(|s| s * s).sum::<f32>() / x.len() as f32).sqrt()
    }

    #[test]
    fn test_detect_various_frequencies() {
        let mut detector = PitchDetector::new(16000);
        for freq in [80.0, 110.0, 150.0, 220.0, 330.0] {
            let result = detector.detect(&sine(16000, freq, 2048));
            assert!(result.is_voiced(), "should detect {freq} Hz");
            let error = ((result.f0 - freq) / freq).abs();
            assert!(error < 0.01, "expected {freq} Hz, got {} Hz", result.f0);
            assert!(result.confidence > 0.9);
        }
    }

    #[test]
    fn test_weak_fundamental_still_tracked() {
        // Harmonics 2..=6 dominate; the period is still 100 Hz
        let sr = 16000;
        let samples: Vec<f32> = (0..1024)
            .map(|i| {
                let t = i as f32 / sr as f32;
                0.1 * (2.0 * PI * 100.0 * t).sin()
                    + (2..=6)
                        .map(|h| (2.0 * PI * 100.0 * h as f32 * t).sin() / h as f32)
                        .sum::<f32>()
            })
            .collect();
        let result = PitchDetector::new(sr).detect(&samples);
        assert_abs_diff_eq!(result.f0, 100.0, epsilon = 1.0);
    }

    #[test]
    fn test_silence_is_unvoiced() {
        let mut detector = PitchDetector::new(16000);
        let result = detector.detect(&vec![0.0; 2048]);
        assert!(!result.is_voiced());
    }

    #[test]
    fn test_short_frame_is_unvoiced() {
        let mut detector = PitchDetector::new(16000);
        assert!(!detector.detect(&sine(16000, 200.0, 16)).is_voiced());
    }

    #[test]
    fn test_threshold_is_clamped() {
        let mut detector = PitchDetector::new(16000);
        detector.set_threshold(2.0);
        assert_eq!(detector.threshold(), 0.5);
        detector.set_threshold(0.0);
        assert_eq!(detector.threshold(), 0.01);
    }

    #[test]
    fn test_tracker_silence_gate() {
        let mut tracker = PitchTracker::new(16000, PitchTrackerConfig::default());
        let quiet: Vec<f32> = sine(16000, 200.0, 2048).iter().map(|s| s * 1e-5).collect();
        assert!(!tracker.track(&quiet, rms(&quiet)).is_voiced());
    }

    #[test]
    fn test_tracker_holds_across_octave_jump() {
        let mut tracker = PitchTracker::new(16000, PitchTrackerConfig::default());
        let low = sine(16000, 110.0, 2048);
        let high = sine(16000, 440.0, 2048);

        let first = tracker.track(&low, rms(&low));
        assert_abs_diff_eq!(first.f0, 110.0, epsilon = 1.5);

        // Two-octave jump gets held at the previous contour
        let held = tracker.track(&high, rms(&high));
        assert_abs_diff_eq!(held.f0, first.f0, epsilon = 1e-3);
        let held = tracker.track(&high, rms(&high));
        assert_abs_diff_eq!(held.f0, first.f0, epsilon = 1e-3);

        // then accepted once it persists
        let accepted = tracker.track(&high, rms(&high));
        assert_abs_diff_eq!(accepted.f0, 440.0, epsilon = 5.0);
    }

    #[test]
    fn test_tracker_follows_small_steps() {
        let mut tracker = PitchTracker::new(16000, PitchTrackerConfig::default());
        for freq in [150.0, 160.0, 170.0, 180.0] {
            let frame = sine(16000, freq, 2048);
            let est = tracker.track(&frame, rms(&frame));
            assert_relative_eq!(est.f0, freq, max_relative = 0.01);
        }
    }

    #[test]
    fn test_jump_weight() {
        assert_eq!(jump_weight(1.1, 2.0), 1.0);
        assert_eq!(jump_weight(0.8, 2.0), 1.0);
        assert!(jump_weight(2.0, 2.0) < 0.5);
        assert!(jump_weight(4.0, 2.0) < jump_weight(2.0, 2.0));
    }
}
