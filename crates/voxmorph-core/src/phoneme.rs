//! Phoneme timing supplied by an external aligner.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One labeled span of speech, times in seconds on the input timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeInterval {
    pub label: String,
    pub start: f64,
    pub end: f64,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

impl PhonemeInterval {
    pub fn new(label: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            label: label.into(),
            start,
            end,
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Half-open containment: `start <= time < end`.
    #[inline]
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Sorted, non-overlapping phoneme intervals with timestamp lookup.
///
/// Read-only once built; the pipeline never mutates alignment data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhonemeTimeline {
    intervals: Vec<PhonemeInterval>,
}

impl PhonemeTimeline {
    /// Validate and wrap a list of intervals.
    ///
    /// Intervals must be finite, have `start < end`, be sorted by start and
    /// must not overlap. Touching intervals (`a.end == b.start`) are allowed.
    pub fn new(intervals: Vec<PhonemeInterval>) -> Result<Self> {
        for (i, interval) in intervals.iter().enumerate() {
            if !interval.start.is_finite() || !interval.end.is_finite() {
                return Err(Error::InvalidConfiguration(format!(
                    "phoneme interval {} ('{}') has non-finite bounds",
                    i, interval.label
                )));
            }
            if interval.start >= interval.end {
                return Err(Error::InvalidConfiguration(format!(
                    "phoneme interval {} ('{}') is empty or reversed: {}..{}",
                    i, interval.label, interval.start, interval.end
                )));
            }
        }
        for pair in intervals.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(Error::InvalidConfiguration(format!(
                    "phoneme intervals '{}' and '{}' overlap or are unsorted",
                    pair[0].label, pair[1].label
                )));
            }
        }
        Ok(Self { intervals })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn intervals(&self) -> &[PhonemeInterval] {
        &self.intervals
    }

    /// Interval covering `time`, or `None` inside an alignment gap.
    pub fn find(&self, time: f64) -> Option<&PhonemeInterval> {
        let idx = self.intervals.partition_point(|p| p.start <= time);
        if idx == 0 {
            return None;
        }
        let candidate = &self.intervals[idx - 1];
        candidate.contains(time).then_some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> PhonemeTimeline {
        PhonemeTimeline::new(vec![
            PhonemeInterval::new("HH", 0.0, 0.1),
            PhonemeInterval::new("AA", 0.2, 0.4),
            PhonemeInterval::new("T", 0.4, 0.45),
        ])
        .unwrap()
    }

    #[test]
    fn test_lookup_by_containment() {
        let t = timeline();
        assert_eq!(t.find(0.05).map(|p| p.label.as_str()), Some("HH"));
        assert_eq!(t.find(0.2).map(|p| p.label.as_str()), Some("AA"));
        assert_eq!(t.find(0.3999).map(|p| p.label.as_str()), Some("AA"));
        assert_eq!(t.find(0.4).map(|p| p.label.as_str()), Some("T"));
    }

    #[test]
    fn test_gaps_return_none() {
        let t = timeline();
        assert!(t.find(0.15).is_none());
        assert!(t.find(-0.01).is_none());
        assert!(t.find(0.5).is_none());
        assert!(PhonemeTimeline::empty().find(0.0).is_none());
    }

    #[test]
    fn test_rejects_overlap_and_unsorted() {
        let overlapping = PhonemeTimeline::new(vec![
            PhonemeInterval::new("A", 0.0, 0.3),
            PhonemeInterval::new("B", 0.2, 0.4),
        ]);
        assert!(matches!(overlapping, Err(Error::InvalidConfiguration(_))));

        let unsorted = PhonemeTimeline::new(vec![
            PhonemeInterval::new("B", 0.5, 0.6),
            PhonemeInterval::new("A", 0.0, 0.1),
        ]);
        assert!(unsorted.is_err());

        let reversed = PhonemeTimeline::new(vec![PhonemeInterval::new("A", 0.3, 0.1)]);
        assert!(reversed.is_err());
    }

    #[test]
    fn test_confidence_clamped() {
        let p = PhonemeInterval::new("AA", 0.0, 1.0).with_confidence(1.7);
        assert_eq!(p.confidence, 1.0);
    }
}
