//! Object key conventions shared with downstream consumers.
//!
//! Every output key is derived from the triggering key alone, so a job that
//! runs twice overwrites its own outputs instead of colliding.

use std::path::Path;

pub const DEFAULT_EXTENSION: &str = "mp4";

/// Final path component of a key, e.g. `talk.mp4`.
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Base name without its extension, e.g. `talk`.
pub fn stem(key: &str) -> &str {
    let base = base_name(key);
    match base.rfind('.') {
        Some(0) | None => base,
        Some(dot) => &base[..dot],
    }
}

/// Extension of the key, or `mp4` when it has none.
pub fn extension(key: &str) -> &str {
    let base = base_name(key);
    match base.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < base.len() => &base[dot + 1..],
        _ => DEFAULT_EXTENSION,
    }
}

/// `<stem>_<NNN>.<ext>`, the file name of one produced segment.
pub fn segment_file_name(parent_key: &str, index: usize) -> String {
    format!("{}_{:03}.{}", stem(parent_key), index, extension(parent_key))
}

/// `segments/<base>/<stem>_<NNN>.<ext>`
pub fn segment_key(parent_key: &str, index: usize) -> String {
    format!(
        "segments/{}/{}",
        base_name(parent_key),
        segment_file_name(parent_key, index)
    )
}

/// `segments/<base>/`, the prefix under which a parent's segments live.
pub fn segment_prefix(parent_key: &str) -> String {
    format!("segments/{}/", base_name(parent_key))
}

pub fn transcript_key(chunk_key: &str) -> String {
    format!("transcripts/{}.json", stem(chunk_key))
}

pub fn scenes_key(chunk_key: &str) -> String {
    format!("scenes/{}.json", stem(chunk_key))
}

pub fn tags_key(chunk_key: &str) -> String {
    format!("tags/{}.json", stem(chunk_key))
}

pub fn rendered_key(task_id: &str, extension: &str) -> String {
    format!("rendered/{}.{}", task_id, extension)
}

/// Key-derived prefix for scratch directories: readable in `/tmp` listings
/// and identical across re-runs of the same job.
pub fn scratch_prefix(stage: &str, key: &str) -> String {
    let sanitized: String = stem(key)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(48)
        .collect();
    format!("chronos_{}_{}_", stage, sanitized)
}

/// Segment index encoded in a produced file name, if it was produced for `parent_key`.
pub fn parse_segment_index(parent_key: &str, file_name: &str) -> Option<usize> {
    let digits = file_name
        .strip_prefix(stem(parent_key))?
        .strip_prefix('_')?
        .strip_suffix(extension(parent_key))?
        .strip_suffix('.')?;
    if digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// File name of a local path as UTF-8.
pub fn local_file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(base_name("uploads/2024/talk.mp4"), "talk.mp4");
        assert_eq!(stem("uploads/2024/talk.final.mov"), "talk.final");
        assert_eq!(extension("uploads/talk.mov"), "mov");
        assert_eq!(extension("uploads/talk"), "mp4");
        assert_eq!(stem(".hidden"), ".hidden");
    }

    #[test]
    fn test_persisted_layout() {
        assert_eq!(segment_key("up/talk.mp4", 7), "segments/talk.mp4/talk_007.mp4");
        assert_eq!(segment_prefix("up/talk.mp4"), "segments/talk.mp4/");
        assert_eq!(transcript_key("segments/talk.mp4/talk_007.mp4"), "transcripts/talk_007.json");
        assert_eq!(scenes_key("talk.mp4"), "scenes/talk.json");
        assert_eq!(tags_key("talk.mp4"), "tags/talk.json");
        assert_eq!(rendered_key("abc", "mkv"), "rendered/abc.mkv");
    }

    #[test]
    fn test_parse_segment_index_only_matches_own_outputs() {
        assert_eq!(parse_segment_index("talk.mp4", "talk_000.mp4"), Some(0));
        assert_eq!(parse_segment_index("talk.mp4", "talk_012.mp4"), Some(12));
        assert_eq!(parse_segment_index("talk.mp4", "talk_1234.mp4"), Some(1234));
        assert_eq!(parse_segment_index("talk.mp4", "talk.mp4"), None);
        assert_eq!(parse_segment_index("talk.mp4", "talk_01.mp4"), None);
        assert_eq!(parse_segment_index("talk.mp4", "talk_abc.mp4"), None);
        assert_eq!(parse_segment_index("talk.mp4", "talk_000.mov"), None);
        assert_eq!(parse_segment_index("talk.mp4", "other_000.mp4"), None);
    }

    #[test]
    fn test_scratch_prefix_is_stable() {
        assert_eq!(
            scratch_prefix("probe", "up/my talk.mp4"),
            scratch_prefix("probe", "up/my talk.mp4")
        );
        assert_eq!(scratch_prefix("probe", "up/my talk.mp4"), "chronos_probe_my_talk_");
    }
}
