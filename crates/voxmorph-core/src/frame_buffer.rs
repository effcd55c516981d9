//! Chunk-to-frame conversion.
//!
//! Turns an arbitrary-length stream of [`AudioChunk`]s into fixed-size,
//! overlapping [`AnalysisFrame`]s advancing by the hop size.
//!
//! The buffer prepends `frame_size - hop_size` zeros to the stream so that the
//! very first input sample is already covered by a full set of overlapping
//! frames. Downstream, the reconstructor discards the same amount of leading
//! output (see [`FrameLayout::padding`]).

use serde::{Deserialize, Serialize};

use crate::chunk::{AnalysisFrame, AudioChunk};
use crate::error::{Error, Result};

/// Frame size and hop, shared by analysis and synthesis for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    pub frame_size: usize,
    pub hop_size: usize,
}

impl FrameLayout {
    /// Smallest frame with a non-empty cepstral envelope band.
    pub const MIN_FRAME_SIZE: usize = 4;

    /// Create a validated layout.
    ///
    /// Fails with `InvalidConfiguration` unless the frame holds at least
    /// [`MIN_FRAME_SIZE`](Self::MIN_FRAME_SIZE) samples and
    /// `0 < hop_size <= frame_size / 2`. Below 50% overlap the streaming
    /// path could emit audio past the end of a compressed output.
    pub fn new(frame_size: usize, hop_size: usize) -> Result<Self> {
        let layout = Self {
            frame_size,
            hop_size,
        };
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_size == 0 || self.hop_size == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "frame size and hop size must be positive (frame={}, hop={})",
                self.frame_size, self.hop_size
            )));
        }
        if self.frame_size < Self::MIN_FRAME_SIZE {
            return Err(Error::InvalidConfiguration(format!(
                "frame size {} is below the minimum of {} samples",
                self.frame_size,
                Self::MIN_FRAME_SIZE
            )));
        }
        if self.hop_size * 2 > self.frame_size {
            return Err(Error::InvalidConfiguration(format!(
                "hop size {} must be at most half the frame size {}",
                self.hop_size, self.frame_size
            )));
        }
        Ok(())
    }

    /// Samples shared by two consecutive frames.
    #[inline]
    pub fn overlap(&self) -> usize {
        self.frame_size - self.hop_size
    }

    /// Leading zeros inserted before the first input sample.
    #[inline]
    pub fn padding(&self) -> usize {
        self.overlap()
    }

    /// Number of frequency bins of a real FFT over one frame.
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.frame_size / 2 + 1
    }

    pub fn hop_secs(&self, sample_rate: u32) -> f64 {
        self.hop_size as f64 / sample_rate as f64
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 512,
        }
    }
}

/// Streaming framer with a bounded carry buffer.
///
/// Between calls the carry holds at most `frame_size - 1` samples: everything
/// from the start of the next, still incomplete frame.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    layout: FrameLayout,
    sample_rate: Option<u32>,
    carry: Vec<f32>,
    next_frame_start: i64,
    next_index: u64,
    expected_sequence: u64,
    total_input: u64,
    finished: bool,
}

impl FrameBuffer {
    pub fn new(layout: FrameLayout) -> Result<Self> {
        layout.validate()?;
        let mut buffer = Self {
            layout,
            sample_rate: None,
            carry: Vec::with_capacity(layout.frame_size),
            next_frame_start: 0,
            next_index: 0,
            expected_sequence: 0,
            total_input: 0,
            finished: false,
        };
        buffer.reset();
        Ok(buffer)
    }

    /// Restart the stream from scratch (sequence 0, fresh padding).
    pub fn reset(&mut self) {
        let padding = self.layout.padding();
        self.carry.clear();
        self.carry.resize(padding, 0.0);
        self.next_frame_start = -(padding as i64);
        self.next_index = 0;
        self.expected_sequence = 0;
        self.total_input = 0;
        self.sample_rate = None;
        self.finished = false;
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Samples waiting for the next frame.
    pub fn carried(&self) -> usize {
        self.carry.len()
    }

    /// Total input samples accepted so far.
    pub fn total_input(&self) -> u64 {
        self.total_input
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Accept one chunk and return every frame that became complete.
    ///
    /// Chunks must arrive with contiguous sequence indices starting at 0 and a
    /// constant sample rate; anything else is rejected without touching state.
    pub fn push(&mut self, chunk: &AudioChunk) -> Result<Vec<AnalysisFrame>> {
        if self.finished {
            return Err(Error::StreamClosed);
        }
        if chunk.sequence() != self.expected_sequence {
            return Err(Error::OutOfOrderChunk {
                expected: self.expected_sequence,
                got: chunk.sequence(),
            });
        }
        match self.sample_rate {
            Some(rate) if rate != chunk.sample_rate() => {
                return Err(Error::SampleRateMismatch {
                    expected: rate,
                    got: chunk.sample_rate(),
                });
            }
            Some(_) => {}
            None => {
                if chunk.sample_rate() == 0 {
                    return Err(Error::InvalidConfiguration(
                        "chunk sample rate must be positive".into(),
                    ));
                }
                self.sample_rate = Some(chunk.sample_rate());
            }
        }

        self.expected_sequence += 1;
        self.total_input += chunk.len() as u64;
        self.carry.extend_from_slice(chunk.samples());

        let mut frames = Vec::new();
        while self.carry.len() >= self.layout.frame_size {
            let samples = self.carry[..self.layout.frame_size].to_vec();
            frames.push(self.emit(samples));
        }
        Ok(frames)
    }

    /// Signal end of stream and return the zero-padded trailing frames.
    ///
    /// Frames keep coming until every real input sample has been covered by
    /// every frame that overlaps it. Calling `finish` twice yields nothing.
    pub fn finish(&mut self) -> Vec<AnalysisFrame> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut frames = Vec::new();
        while self.next_frame_start < self.total_input as i64 {
            let mut samples = Vec::with_capacity(self.layout.frame_size);
            let take = self.carry.len().min(self.layout.frame_size);
            samples.extend_from_slice(&self.carry[..take]);
            samples.resize(self.layout.frame_size, 0.0);
            frames.push(self.emit(samples));
        }
        self.carry.clear();
        frames
    }

    fn emit(&mut self, samples: Vec<f32>) -> AnalysisFrame {
        let frame = AnalysisFrame {
            index: self.next_index,
            start_sample: self.next_frame_start,
            sample_rate: self.sample_rate.unwrap_or_default(),
            samples,
        };
        let advance = self.layout.hop_size.min(self.carry.len());
        self.carry.drain(..advance);
        self.next_frame_start += self.layout.hop_size as i64;
        self.next_index += 1;
        frame
    }
}

/// Lazy frame sequence over an iterator of chunks.
///
/// Pulls chunks only when its internal queue of ready frames runs dry, and
/// emits the padded tail once the source is exhausted.
pub struct Frames<I> {
    buffer: FrameBuffer,
    source: I,
    ready: std::collections::VecDeque<AnalysisFrame>,
    failed: bool,
}

impl<I> Frames<I>
where
    I: Iterator<Item = AudioChunk>,
{
    pub fn new(layout: FrameLayout, source: I) -> Result<Self> {
        Ok(Self {
            buffer: FrameBuffer::new(layout)?,
            source,
            ready: std::collections::VecDeque::new(),
            failed: false,
        })
    }
}

impl<I> Iterator for Frames<I>
where
    I: Iterator<Item = AudioChunk>,
{
    type Item = Result<AnalysisFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Some(Ok(frame));
            }
            if self.failed || self.buffer.is_finished() {
                return None;
            }
            match self.source.next() {
                Some(chunk) => match self.buffer.push(&chunk) {
                    Ok(frames) => self.ready.extend(frames),
                    Err(err) => {
                        self.failed = true;
                        return Some(Err(err));
                    }
                },
                None => self.ready.extend(self.buffer.finish()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32 + 1.0).collect()
    }

    #[test]
    fn test_layout_validation() {
        assert!(FrameLayout::new(1024, 256).is_ok());
        assert!(matches!(
            FrameLayout::new(1024, 1024),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            FrameLayout::new(1024, 2048),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            FrameLayout::new(0, 0),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            FrameLayout::new(1024, 0),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_layout_rejects_tiny_frames() {
        for (frame, hop) in [(1, 1), (2, 1), (3, 1)] {
            assert!(matches!(
                FrameLayout::new(frame, hop),
                Err(Error::InvalidConfiguration(_))
            ));
        }
        assert!(FrameLayout::new(4, 1).is_ok());
        assert!(FrameLayout::new(4, 2).is_ok());
    }

    #[test]
    fn test_layout_requires_half_overlap() {
        assert!(FrameLayout::new(512, 256).is_ok());
        for hop in [257, 384, 500, 511] {
            assert!(matches!(
                FrameLayout::new(512, hop),
                Err(Error::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_frames_overlap_by_frame_minus_hop() {
        let layout = FrameLayout::new(8, 2).unwrap();
        let mut buffer = FrameBuffer::new(layout).unwrap();
        let chunk = AudioChunk::new(ramp(20), 100, 0, 0.0);

        let frames = buffer.push(&chunk).unwrap();
        assert!(frames.len() >= 2);
        for pair in frames.windows(2) {
            assert_eq!(pair[1].start_sample - pair[0].start_sample, 2);
            assert_eq!(pair[0].samples[2..], pair[1].samples[..6]);
        }
        // First frame starts inside the padding
        assert_eq!(frames[0].start_sample, -6);
        assert_eq!(&frames[0].samples[..6], &[0.0; 6]);
        assert_eq!(frames[0].samples[6], 1.0);
    }

    #[test]
    fn test_carry_stays_bounded() {
        let layout = FrameLayout::new(16, 4).unwrap();
        let mut buffer = FrameBuffer::new(layout).unwrap();
        for (seq, len) in [3usize, 17, 1, 40, 5].iter().enumerate() {
            let chunk = AudioChunk::new(vec![0.25; *len], 100, seq as u64, 0.0);
            buffer.push(&chunk).unwrap();
            assert!(buffer.carried() < 16);
        }
    }

    #[test]
    fn test_chunking_does_not_change_frames() {
        let layout = FrameLayout::new(32, 8).unwrap();
        let signal = ramp(203);

        let mut whole = FrameBuffer::new(layout).unwrap();
        let mut expected = whole.push(&AudioChunk::new(signal.clone(), 100, 0, 0.0)).unwrap();
        expected.extend(whole.finish());

        let mut pieces = FrameBuffer::new(layout).unwrap();
        let mut actual = Vec::new();
        for chunk in AudioChunk::split(&signal, 100, 7) {
            actual.extend(pieces.push(&chunk).unwrap());
        }
        actual.extend(pieces.finish());

        assert_eq!(expected, actual);
    }

    #[test]
    fn test_finish_zero_pads_final_frame() {
        let layout = FrameLayout::new(8, 4).unwrap();
        let mut buffer = FrameBuffer::new(layout).unwrap();
        let frames = buffer.push(&AudioChunk::new(ramp(6), 100, 0, 0.0)).unwrap();
        assert_eq!(frames.len(), 1);

        let tail = buffer.finish();
        // Every frame starting before the last input sample must be emitted
        let last = tail.last().unwrap();
        assert!(last.start_sample < 6);
        assert!(last.start_sample + 4 >= 6);
        assert_eq!(last.samples.len(), 8);
        assert_eq!(*last.samples.last().unwrap(), 0.0);

        // The last real sample appears in the tail
        assert!(tail.iter().any(|f| f.samples.contains(&6.0)));
        assert!(buffer.finish().is_empty());
    }

    #[test]
    fn test_empty_stream_emits_nothing() {
        let mut buffer = FrameBuffer::new(FrameLayout::new(8, 4).unwrap()).unwrap();
        assert!(buffer.finish().is_empty());
    }

    #[test]
    fn test_rejects_out_of_order_chunk() {
        let mut buffer = FrameBuffer::new(FrameLayout::default()).unwrap();
        buffer.push(&AudioChunk::new(vec![0.0; 10], 16000, 0, 0.0)).unwrap();
        let err = buffer
            .push(&AudioChunk::new(vec![0.0; 10], 16000, 2, 0.0))
            .unwrap_err();
        assert_eq!(err, Error::OutOfOrderChunk { expected: 1, got: 2 });
        assert_eq!(buffer.total_input(), 10);
    }

    #[test]
    fn test_rejects_sample_rate_change() {
        let mut buffer = FrameBuffer::new(FrameLayout::default()).unwrap();
        buffer.push(&AudioChunk::new(vec![0.0; 10], 16000, 0, 0.0)).unwrap();
        let err = buffer
            .push(&AudioChunk::new(vec![0.0; 10], 44100, 1, 0.0))
            .unwrap_err();
        assert!(matches!(err, Error::SampleRateMismatch { .. }));
    }

    #[test]
    fn test_push_after_finish_fails() {
        let mut buffer = FrameBuffer::new(FrameLayout::default()).unwrap();
        buffer.finish();
        assert_eq!(
            buffer.push(&AudioChunk::new(vec![0.0; 4], 16000, 0, 0.0)),
            Err(Error::StreamClosed)
        );
    }

    #[test]
    fn test_lazy_frames_match_buffer() {
        let layout = FrameLayout::new(16, 4).unwrap();
        let signal = ramp(77);
        let chunks = AudioChunk::split(&signal, 100, 10);

        let lazy: Vec<AnalysisFrame> = Frames::new(layout, chunks.clone().into_iter())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        let mut buffer = FrameBuffer::new(layout).unwrap();
        let mut eager = Vec::new();
        for chunk in &chunks {
            eager.extend(buffer.push(chunk).unwrap());
        }
        eager.extend(buffer.finish());

        assert_eq!(lazy, eager);
        for (i, frame) in lazy.iter().enumerate() {
            assert_eq!(frame.index, i as u64);
        }
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut buffer = FrameBuffer::new(FrameLayout::new(8, 2).unwrap()).unwrap();
        buffer.push(&AudioChunk::new(vec![1.0; 20], 100, 0, 0.0)).unwrap();
        buffer.finish();
        buffer.reset();
        let frames = buffer.push(&AudioChunk::new(vec![1.0; 20], 100, 0, 0.0)).unwrap();
        assert_eq!(frames[0].index, 0);
        assert_eq!(frames[0].start_sample, -6);
    }
}
