//! Time ranges and the interval math used by the render engine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A half-open time range `[start, end)` in seconds.
///
/// `source_key` ties the clip to a specific object when several sources are
/// combined in one render; `None` means "the render's default source".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawClip")]
pub struct Clip {
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
}

#[derive(Deserialize)]
struct RawClip {
    start: f64,
    end: f64,
    #[serde(default, alias = "sourceKey")]
    source_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid clip [{start}, {end}): expected 0 <= start < end")]
pub struct InvalidClip {
    pub start: f64,
    pub end: f64,
}

impl TryFrom<RawClip> for Clip {
    type Error = InvalidClip;

    fn try_from(raw: RawClip) -> Result<Self, Self::Error> {
        let clip = Clip::new(raw.start, raw.end)?;
        Ok(match raw.source_key {
            Some(key) => clip.with_source(key),
            None => clip,
        })
    }
}

impl Clip {
    pub fn new(start: f64, end: f64) -> Result<Self, InvalidClip> {
        // NaN fails both comparisons
        if start >= 0.0 && start < end && end.is_finite() {
            Ok(Self {
                start,
                end,
                source_key: None,
            })
        } else {
            Err(InvalidClip { start, end })
        }
    }

    pub fn with_source(mut self, source_key: impl Into<String>) -> Self {
        self.source_key = Some(source_key.into());
        self
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// The object this clip is cut from, falling back to `default_key`.
    pub fn source_or<'a>(&'a self, default_key: &'a str) -> &'a str {
        self.source_key.as_deref().unwrap_or(default_key)
    }
}

impl fmt::Display for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}, {:.3})", self.start, self.end)
    }
}

/// Clips ordered by `start`, stable for equal starts.
pub fn sorted_by_start(clips: &[Clip]) -> Vec<Clip> {
    let mut sorted = clips.to_vec();
    sorted.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal));
    sorted
}

/// Ranges of `[0, total_duration)` not covered by `selected`, in ascending order.
///
/// Overlapping and nested selections are absorbed by the cursor, so no merge
/// pass is needed first. Selections reaching past `total_duration` are clamped.
pub fn complement(selected: &[Clip], total_duration: f64) -> Vec<Clip> {
    let mut gaps = Vec::new();
    let mut cursor = 0.0_f64;

    for clip in sorted_by_start(selected) {
        if clip.start > cursor {
            push_gap(&mut gaps, cursor, clip.start.min(total_duration));
        }
        cursor = cursor.max(clip.end);
    }

    if cursor < total_duration {
        push_gap(&mut gaps, cursor, total_duration);
    }
    gaps
}

fn push_gap(gaps: &mut Vec<Clip>, start: f64, end: f64) {
    if let Ok(gap) = Clip::new(start, end) {
        gaps.push(gap);
    }
}

/// Parse a model-produced JSON array of `{start, end}` objects.
///
/// Anything that is not a well-formed array of valid clips yields an empty list.
pub fn parse_clips_lenient(raw: &str) -> Vec<Clip> {
    match serde_json::from_str::<Vec<Clip>>(raw.trim()) {
        Ok(clips) => clips,
        Err(e) => {
            tracing::warn!(error = %e, "clip list is not valid JSON, using empty list");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Overlapping or touching clips joined into a sorted cover.
    fn merge(clips: &[Clip]) -> Vec<Clip> {
        let mut merged: Vec<Clip> = Vec::with_capacity(clips.len());
        for clip in sorted_by_start(clips) {
            match merged.last_mut() {
                Some(last) if clip.start <= last.end => {
                    if clip.end > last.end {
                        last.end = clip.end;
                    }
                }
                _ => merged.push(Clip {
                    start: clip.start,
                    end: clip.end,
                    source_key: None,
                }),
            }
        }
        merged
    }

    fn clip(start: f64, end: f64) -> Clip {
        Clip::new(start, end).unwrap()
    }

    fn bounds(clips: &[Clip]) -> Vec<(f64, f64)> {
        clips.iter().map(|c| (c.start, c.end)).collect()
    }

    #[test]
    fn test_clip_rejects_empty_and_negative_ranges() {
        assert!(Clip::new(5.0, 5.0).is_err());
        assert!(Clip::new(6.0, 5.0).is_err());
        assert!(Clip::new(-1.0, 5.0).is_err());
        assert!(Clip::new(f64::NAN, 5.0).is_err());
        assert!(Clip::new(0.0, 0.5).is_ok());
    }

    #[test]
    fn test_complement_between_selections() {
        let remaining = complement(&[clip(0.0, 10.0), clip(20.0, 30.0)], 30.0);
        assert_eq!(bounds(&remaining), vec![(10.0, 20.0)]);
    }

    #[test]
    fn test_complement_sorts_unsorted_input() {
        let remaining = complement(&[clip(5.0, 10.0), clip(0.0, 3.0)], 30.0);
        assert_eq!(bounds(&remaining), vec![(3.0, 5.0), (10.0, 30.0)]);
    }

    #[test]
    fn test_complement_with_gap_before_first_selection() {
        let remaining = complement(&[clip(5.0, 10.0)], 30.0);
        assert_eq!(bounds(&remaining), vec![(0.0, 5.0), (10.0, 30.0)]);
    }

    #[test]
    fn test_complement_of_nothing_is_everything() {
        assert_eq!(bounds(&complement(&[], 30.0)), vec![(0.0, 30.0)]);
    }

    #[test]
    fn test_complement_of_everything_is_empty() {
        assert!(complement(&[clip(0.0, 30.0)], 30.0).is_empty());
    }

    #[test]
    fn test_complement_absorbs_overlapping_and_nested_selections() {
        let selected = [clip(2.0, 12.0), clip(4.0, 6.0), clip(10.0, 15.0), clip(20.0, 25.0)];
        let remaining = complement(&selected, 30.0);
        assert_eq!(bounds(&remaining), vec![(0.0, 2.0), (15.0, 20.0), (25.0, 30.0)]);
    }

    #[test]
    fn test_complement_clamps_selections_past_the_end() {
        let remaining = complement(&[clip(10.0, 40.0), clip(35.0, 50.0)], 30.0);
        assert_eq!(bounds(&remaining), vec![(0.0, 10.0)]);
    }

    #[test]
    fn test_complement_and_selection_tile_the_timeline() {
        let selected = [clip(1.5, 4.0), clip(3.0, 7.25), clip(9.0, 11.0), clip(28.0, 30.0)];
        let total = 30.0;
        let remaining = complement(&selected, total);

        let mut tiles = merge(&selected);
        tiles.extend(remaining.iter().cloned());
        let tiles = sorted_by_start(&tiles);

        assert_eq!(tiles.first().map(|c| c.start), Some(0.0));
        assert_eq!(tiles.last().map(|c| c.end), Some(total));
        for pair in tiles.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap at {}", pair[0]);
        }
    }

    #[test]
    fn test_parse_clips_lenient() {
        let clips = parse_clips_lenient(r#"[{"start": 120.5, "end": 125.0}]"#);
        assert_eq!(bounds(&clips), vec![(120.5, 125.0)]);

        assert!(parse_clips_lenient("not json").is_empty());
        assert!(parse_clips_lenient(r#"{"start": 1, "end": 2}"#).is_empty());
        assert!(parse_clips_lenient(r#"[{"start": 9, "end": 2}]"#).is_empty());
    }

    #[test]
    fn test_deserialize_clip_with_source() {
        let clip: Clip =
            serde_json::from_str(r#"{"start": 1.0, "end": 2.0, "sourceKey": "b.mp4"}"#).unwrap();
        assert_eq!(clip.source_or("a.mp4"), "b.mp4");
    }
}
