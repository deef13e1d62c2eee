use super::layout;
use super::planner::SegmentWindow;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A produced slice of a parent video. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub parent_key: String,
    pub index: usize,
    pub storage_key: String,
    pub start_offset_seconds: f64,
}

/// A segment file found on local disk, before upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducedSegment {
    pub index: usize,
    pub local_path: PathBuf,
}

/// Keep only files named like segments of `parent_key`, ascending by index.
pub fn discover<P: AsRef<Path>>(parent_key: &str, candidates: &[P]) -> Vec<ProducedSegment> {
    let mut produced: Vec<ProducedSegment> = candidates
        .iter()
        .filter_map(|path| {
            let path = path.as_ref();
            let name = layout::local_file_name(path)?;
            let index = layout::parse_segment_index(parent_key, name)?;
            Some(ProducedSegment {
                index,
                local_path: path.to_path_buf(),
            })
        })
        .collect();
    produced.sort_by_key(|segment| segment.index);
    produced
}

impl Segment {
    pub fn from_window(parent_key: &str, window: &SegmentWindow) -> Self {
        Self {
            parent_key: parent_key.to_string(),
            index: window.index,
            storage_key: layout::segment_key(parent_key, window.index),
            start_offset_seconds: window.start_offset_seconds,
        }
    }
}
