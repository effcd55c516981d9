//! Output-to-input time mapping for duration changes.
//!
//! Output frames advance by the hop size. The input position mapped to each
//! output frame center advances by `hop / ratio`, where `ratio` is the
//! stretch in effect at that frame, so a ratio of 2 visits the input at half
//! speed. Positions are in samples of the unpadded input timeline.
//!
//! Once the input length is known, the output length is where the map
//! crosses the end of the input: the integral of the local ratio over the
//! input, or `round(len * ratio)` for a constant ratio.

use voxmorph_core::FrameLayout;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    output: f64,
    input: f64,
    ratio: f64,
}

#[derive(Debug, Clone)]
pub struct TimeMap {
    layout: FrameLayout,
    next_frame: u64,
    input_position: f64,
    last: Option<Segment>,
    input_len: Option<u64>,
    output_end: Option<f64>,
}

impl TimeMap {
    /// Map starting at stretch `initial_ratio`.
    pub fn new(layout: FrameLayout, initial_ratio: f32) -> Self {
        let first_center = Self::center_offset(layout);
        Self {
            layout,
            next_frame: 0,
            input_position: first_center / initial_ratio as f64,
            last: None,
            input_len: None,
            output_end: None,
        }
    }

    /// Center of frame 0 relative to the first real sample.
    fn center_offset(layout: FrameLayout) -> f64 {
        layout.frame_size as f64 / 2.0 - layout.padding() as f64
    }

    /// Output timeline position of frame `index`'s center.
    pub fn output_center(&self, index: u64) -> f64 {
        index as f64 * self.layout.hop_size as f64 + Self::center_offset(self.layout)
    }

    /// Index of the next output frame.
    pub fn next_frame(&self) -> u64 {
        self.next_frame
    }

    /// Input position (samples) mapped to the next output frame center.
    pub fn input_position(&self) -> f64 {
        self.input_position
    }

    /// Fractional analysis frame index whose center is at
    /// [`input_position`](Self::input_position), never negative.
    pub fn source_frame(&self) -> f64 {
        ((self.input_position - Self::center_offset(self.layout)) / self.layout.hop_size as f64)
            .max(0.0)
    }

    /// Commit the next output frame at stretch `ratio`.
    pub fn advance(&mut self, ratio: f32) {
        let segment = Segment {
            output: self.output_center(self.next_frame),
            input: self.input_position,
            ratio: ratio as f64,
        };
        self.check_end(segment);
        self.last = Some(segment);
        self.input_position += self.layout.hop_size as f64 / segment.ratio;
        self.next_frame += 1;
    }

    /// Record the total input length once the stream has ended.
    pub fn set_input_len(&mut self, len: u64) {
        self.input_len = Some(len);
        if let Some(segment) = self.last {
            self.check_end(segment);
        }
    }

    fn check_end(&mut self, segment: Segment) {
        let (Some(len), None) = (self.input_len, self.output_end) else {
            return;
        };
        let len = len as f64;
        let step = self.layout.hop_size as f64 / segment.ratio;
        if segment.input >= len || segment.input + step > len {
            let end = segment.output + (len - segment.input) * segment.ratio;
            self.output_end = Some(end.max(0.0));
        }
    }

    /// Output length in samples, once the input length is known and the map
    /// has reached it.
    pub fn output_len(&self) -> Option<u64> {
        self.output_end.map(|end| end.round() as u64)
    }

    /// All frames needed to cover the output have been committed.
    pub fn is_complete(&self) -> bool {
        match self.output_len() {
            Some(len) => {
                self.next_frame * self.layout.hop_size as u64 >= self.layout.padding() as u64 + len
            }
            None => false,
        }
    }
}
