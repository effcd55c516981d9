//! Audio chunks and analysis frames.

use std::sync::Arc;

/// A block of mono samples as delivered by an audio source.
///
/// Samples are normalized to `[-1, 1]`. Chunks are immutable once built and
/// cheap to clone (the sample data is shared).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    samples: Arc<[f32]>,
    sample_rate: u32,
    sequence: u64,
    start_time: f64,
}

impl AudioChunk {
    pub fn new(
        samples: impl Into<Arc<[f32]>>,
        sample_rate: u32,
        sequence: u64,
        start_time: f64,
    ) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            sequence,
            start_time,
        }
    }

    /// Split a contiguous buffer into sequentially numbered chunks of `chunk_len`
    /// samples (the last chunk may be shorter).
    ///
    /// Mirrors what a file decoder or capture callback hands to the pipeline.
    pub fn split(samples: &[f32], sample_rate: u32, chunk_len: usize) -> Vec<AudioChunk> {
        let chunk_len = chunk_len.max(1);
        samples
            .chunks(chunk_len)
            .enumerate()
            .map(|(i, block)| {
                let start = (i * chunk_len) as f64 / sample_rate as f64;
                AudioChunk::new(block.to_vec(), sample_rate, i as u64, start)
            })
            .collect()
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Start of the chunk in the original timeline, in seconds.
    #[inline]
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A fixed-length window of samples cut from the input stream.
///
/// `start_sample` is the position of the first sample in the input timeline.
/// It is negative for the leading frames, which start inside the zero
/// padding the [`FrameBuffer`](crate::FrameBuffer) prepends.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFrame {
    pub index: u64,
    pub start_sample: i64,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AnalysisFrame {
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Start of the frame in seconds (may be negative).
    pub fn start_time(&self) -> f64 {
        self.start_sample as f64 / self.sample_rate as f64
    }

    /// Timestamp of the frame center, used for phoneme lookup.
    pub fn center_time(&self) -> f64 {
        (self.start_sample as f64 + self.samples.len() as f64 / 2.0) / self.sample_rate as f64
    }

    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.samples.iter().map(|s| s * s).sum();
        (sum / self.samples.len() as f32).sqrt()
    }
}
