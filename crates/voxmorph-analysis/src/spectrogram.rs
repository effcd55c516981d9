//! Spectrogram diagnostics.
//!
//! [`SpectrogramRecorder`] keeps a capped history of per-frame magnitudes.
//! Snapshots convert to dB relative to the loudest cell, floored at
//! `-top_db`. Recording is read-only with respect to the signal path.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::metrics::amplitude_to_db;
use crate::representation::SpectralRepresentation;

/// Default dB range of [`Spectrogram::to_db`].
pub const DEFAULT_TOP_DB: f32 = 80.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramColumn {
    /// Frame center in seconds.
    pub time: f64,
    pub magnitude: Vec<f32>,
}

/// Immutable spectrogram snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spectrogram {
    pub bin_hz: f32,
    pub columns: Vec<SpectrogramColumn>,
}

impl Spectrogram {
    pub fn num_frames(&self) -> usize {
        self.columns.len()
    }

    pub fn num_bins(&self) -> usize {
        self.columns.first().map_or(0, |c| c.magnitude.len())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Largest magnitude across all columns.
    pub fn max_magnitude(&self) -> f32 {
        self.columns
            .iter()
            .flat_map(|c| c.magnitude.iter().copied())
            .fold(0.0, f32::max)
    }

    /// Columns in dB relative to the loudest cell.
    pub fn to_db(&self, top_db: f32) -> Vec<Vec<f32>> {
        let reference = self.max_magnitude();
        self.columns
            .iter()
            .map(|c| {
                c.magnitude
                    .iter()
                    .map(|&m| amplitude_to_db(m, reference, top_db))
                    .collect()
            })
            .collect()
    }
}

/// Rolling recorder with a fixed column capacity.
#[derive(Debug, Clone)]
pub struct SpectrogramRecorder {
    bin_hz: f32,
    capacity: usize,
    columns: VecDeque<SpectrogramColumn>,
}

impl SpectrogramRecorder {
    pub fn new(bin_hz: f32, capacity: usize) -> Self {
        Self {
            bin_hz,
            capacity: capacity.max(1),
            columns: VecDeque::new(),
        }
    }

    pub fn record(&mut self, representation: &SpectralRepresentation) {
        if self.columns.len() == self.capacity {
            self.columns.pop_front();
        }
        self.columns.push_back(SpectrogramColumn {
            time: representation.center_time(),
            magnitude: representation.magnitude().to_vec(),
        });
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn clear(&mut self) {
        self.columns.clear();
    }

    pub fn snapshot(&self) -> Spectrogram {
        Spectrogram {
            bin_hz: self.bin_hz,
            columns: self.columns.iter().cloned().collect(),
        }
    }
}
