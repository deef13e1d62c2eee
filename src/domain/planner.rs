//! Whole-file vs. segmented processing decision.

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_THRESHOLD_SECONDS: f64 = 600.0;
pub const DEFAULT_SEGMENT_SECONDS: f64 = 600.0;
pub const DEFAULT_OVERLAP_SECONDS: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PlanResult {
    Direct,
    Segmented {
        segment_duration_seconds: f64,
        overlap_seconds: f64,
        expected_count: usize,
    },
}

/// One segment's slice of the parent timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentWindow {
    pub index: usize,
    /// Offset into the parent, already pulled back by the overlap.
    pub start_offset_seconds: f64,
    pub duration_seconds: f64,
}

impl SegmentWindow {
    pub fn end_seconds(&self) -> f64 {
        self.start_offset_seconds + self.duration_seconds
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationPlanner {
    pub threshold_seconds: f64,
    pub segment_seconds: f64,
    pub overlap_seconds: f64,
}

impl Default for SegmentationPlanner {
    fn default() -> Self {
        Self {
            threshold_seconds: DEFAULT_THRESHOLD_SECONDS,
            segment_seconds: DEFAULT_SEGMENT_SECONDS,
            overlap_seconds: DEFAULT_OVERLAP_SECONDS,
        }
    }
}

impl SegmentationPlanner {
    /// Values that cannot describe a segmentation (non-finite, negative, or
    /// a zero segment length) are replaced by the defaults.
    pub fn new(threshold_seconds: f64, segment_seconds: f64, overlap_seconds: f64) -> Self {
        let threshold_seconds = if threshold_seconds.is_finite() && threshold_seconds >= 0.0 {
            threshold_seconds
        } else {
            warn!(threshold_seconds, "invalid segmentation threshold, using default");
            DEFAULT_THRESHOLD_SECONDS
        };
        let segment_seconds = if segment_seconds.is_finite() && segment_seconds > 0.0 {
            segment_seconds
        } else {
            warn!(segment_seconds, "invalid segment length, using default");
            DEFAULT_SEGMENT_SECONDS
        };
        let overlap_seconds = if overlap_seconds.is_finite() {
            overlap_seconds
        } else {
            0.0
        };
        Self {
            threshold_seconds,
            segment_seconds,
            // overlap never swallows a whole segment
            overlap_seconds: overlap_seconds.clamp(0.0, segment_seconds / 2.0),
        }
    }

    /// Strictly longer than the threshold means segmented.
    pub fn plan(&self, duration_seconds: f64) -> PlanResult {
        if duration_seconds > self.threshold_seconds {
            PlanResult::Segmented {
                segment_duration_seconds: self.segment_seconds,
                overlap_seconds: self.overlap_seconds,
                expected_count: self.expected_count(duration_seconds),
            }
        } else {
            PlanResult::Direct
        }
    }

    fn expected_count(&self, duration_seconds: f64) -> usize {
        if !duration_seconds.is_finite() {
            return 0;
        }
        (duration_seconds / self.segment_seconds).ceil().max(1.0) as usize
    }

    /// Cut windows covering `[0, duration_seconds]` in temporal order.
    ///
    /// Cut points fall every `segment_seconds`; every segment after the first
    /// starts `overlap_seconds` before its cut so stages see both sides of it.
    pub fn windows(&self, duration_seconds: f64) -> Vec<SegmentWindow> {
        (0..self.expected_count(duration_seconds))
            .map(|index| {
                let cut = index as f64 * self.segment_seconds;
                let start = if index == 0 {
                    0.0
                } else {
                    (cut - self.overlap_seconds).max(0.0)
                };
                let end = (cut + self.segment_seconds).min(duration_seconds);
                SegmentWindow {
                    index,
                    start_offset_seconds: start,
                    duration_seconds: end - start,
                }
            })
            .collect()
    }
}
