//! Per-run statistics.

use serde::{Deserialize, Serialize};
use voxmorph_analysis::SpectralRepresentation;

/// Summary of one run, available at any point and final after the stream
/// has been drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub sample_rate: u32,
    pub input_samples: u64,
    pub output_samples: u64,
    pub input_rms: f32,
    pub output_rms: f32,
    pub frames_analyzed: u64,
    pub frames_voiced: u64,
    /// Frames replaced by silence after a decomposition failure.
    pub frames_recovered: u64,
    pub frames_synthesized: u64,
}

impl RunStats {
    pub fn input_secs(&self) -> f64 {
        self.secs(self.input_samples)
    }

    pub fn output_secs(&self) -> f64 {
        self.secs(self.output_samples)
    }

    fn secs(&self, samples: u64) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            samples as f64 / self.sample_rate as f64
        }
    }

    /// Output duration over input duration.
    pub fn duration_ratio(&self) -> f64 {
        if self.input_samples == 0 {
            0.0
        } else {
            self.output_samples as f64 / self.input_samples as f64
        }
    }

    /// Output level change relative to the input, in percent.
    pub fn rms_change_percent(&self) -> f32 {
        if self.input_rms <= 0.0 {
            0.0
        } else {
            (self.output_rms - self.input_rms) / self.input_rms * 100.0
        }
    }
}

/// Running sums behind [`RunStats`].
#[derive(Debug, Clone, Default)]
pub(crate) struct StatsRecorder {
    sample_rate: u32,
    input_samples: u64,
    input_energy: f64,
    output_samples: u64,
    output_energy: f64,
    frames_analyzed: u64,
    frames_voiced: u64,
    frames_recovered: u64,
    frames_synthesized: u64,
}

fn energy(samples: &[f32]) -> f64 {
    samples.iter().map(|s| (*s as f64) * (*s as f64)).sum()
}

impl StatsRecorder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn record_input(&mut self, samples: &[f32]) {
        self.input_samples += samples.len() as u64;
        self.input_energy += energy(samples);
    }

    pub fn record_output(&mut self, samples: &[f32]) {
        self.output_samples += samples.len() as u64;
        self.output_energy += energy(samples);
    }

    pub fn record_analysis(&mut self, representation: &SpectralRepresentation) {
        self.frames_analyzed += 1;
        if representation.voiced() == Some(true) {
            self.frames_voiced += 1;
        }
        if representation.is_recovered() {
            self.frames_recovered += 1;
        }
    }

    pub fn record_synthesized(&mut self, frames: usize) {
        self.frames_synthesized += frames as u64;
    }

    /// Fold in counts kept by another stage.
    pub fn merge(&mut self, other: &StatsRecorder) {
        self.input_samples += other.input_samples;
        self.input_energy += other.input_energy;
        self.output_samples += other.output_samples;
        self.output_energy += other.output_energy;
        self.frames_analyzed += other.frames_analyzed;
        self.frames_voiced += other.frames_voiced;
        self.frames_recovered += other.frames_recovered;
        self.frames_synthesized += other.frames_synthesized;
    }

    pub fn snapshot(&self) -> RunStats {
        let rms = |energy: f64, n: u64| {
            if n == 0 {
                0.0
            } else {
                (energy / n as f64).sqrt() as f32
            }
        };
        RunStats {
            sample_rate: self.sample_rate,
            input_samples: self.input_samples,
            output_samples: self.output_samples,
            input_rms: rms(self.input_energy, self.input_samples),
            output_rms: rms(self.output_energy, self.output_samples),
            frames_analyzed: self.frames_analyzed,
            frames_voiced: self.frames_voiced,
            frames_recovered: self.frames_recovered,
            frames_synthesized: self.frames_synthesized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rms_and_ratio() {
        let mut stats = StatsRecorder::new(16000);
        stats.record_input(&[0.5; 1600]);
        stats.record_output(&[0.25; 800]);
        let snapshot = stats.snapshot();

        assert_relative_eq!(snapshot.input_rms, 0.5, epsilon = 1e-6);
        assert_relative_eq!(snapshot.output_rms, 0.25, epsilon = 1e-6);
        assert_relative_eq!(snapshot.rms_change_percent(), -50.0, epsilon = 1e-4);
        assert_relative_eq!(snapshot.duration_ratio(), 0.5);
        assert_relative_eq!(snapshot.input_secs(), 0.1);
    }

    #[test]
    fn test_empty_run() {
        let snapshot = StatsRecorder::new(16000).snapshot();
        assert_eq!(snapshot.input_rms, 0.0);
        assert_eq!(snapshot.rms_change_percent(), 0.0);
        assert_eq!(snapshot.duration_ratio(), 0.0);
    }

    #[test]
    fn test_merge_adds_counts() {
        let mut a = StatsRecorder::new(8000);
        a.record_input(&[1.0; 10]);
        let mut b = StatsRecorder::new(8000);
        b.record_output(&[1.0; 20]);
        b.record_synthesized(3);
        a.merge(&b);

        let snapshot = a.snapshot();
        assert_eq!(snapshot.input_samples, 10);
        assert_eq!(snapshot.output_samples, 20);
        assert_eq!(snapshot.frames_synthesized, 3);
    }
}
