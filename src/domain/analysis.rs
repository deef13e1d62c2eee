//! Records threaded through and produced by the analysis stage chain.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcribe,
    DetectScenes,
    GenerateTags,
}

impl Stage {
    /// Execution order of the chain.
    pub const ORDER: [Stage; 3] = [Stage::Transcribe, Stage::DetectScenes, Stage::GenerateTags];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transcribe => "transcribe",
            Stage::DetectScenes => "detect_scenes",
            Stage::GenerateTags => "generate_tags",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("stage {attempted} requires {missing} to have completed")]
pub struct StageOrderError {
    pub attempted: Stage,
    pub missing: Stage,
}

/// Accumulating result of one chunk's chain.
///
/// References fill strictly left to right. Each step consumes the previous
/// value and returns a superset of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAnalysisResult")]
pub struct AnalysisResult {
    object_key: String,
    transcript_ref: Option<String>,
    scene_ref: Option<String>,
    tag_ref: Option<String>,
}

#[derive(Deserialize)]
struct RawAnalysisResult {
    object_key: String,
    transcript_ref: Option<String>,
    scene_ref: Option<String>,
    tag_ref: Option<String>,
}

impl TryFrom<RawAnalysisResult> for AnalysisResult {
    type Error = StageOrderError;

    fn try_from(raw: RawAnalysisResult) -> Result<Self, Self::Error> {
        let mut result = AnalysisResult::new(raw.object_key);
        if let Some(r) = raw.transcript_ref {
            result = result.with_transcript(r);
        }
        if let Some(r) = raw.scene_ref {
            result = result.with_scenes(r)?;
        }
        if let Some(r) = raw.tag_ref {
            result = result.with_tags(r)?;
        }
        Ok(result)
    }
}

impl AnalysisResult {
    pub fn new(object_key: impl Into<String>) -> Self {
        Self {
            object_key: object_key.into(),
            transcript_ref: None,
            scene_ref: None,
            tag_ref: None,
        }
    }

    pub fn object_key(&self) -> &str {
        &self.object_key
    }

    pub fn transcript_ref(&self) -> Option<&str> {
        self.transcript_ref.as_deref()
    }

    pub fn scene_ref(&self) -> Option<&str> {
        self.scene_ref.as_deref()
    }

    pub fn tag_ref(&self) -> Option<&str> {
        self.tag_ref.as_deref()
    }

    pub fn with_transcript(self, transcript_ref: impl Into<String>) -> Self {
        Self {
            transcript_ref: Some(transcript_ref.into()),
            scene_ref: None,
            tag_ref: None,
            ..self
        }
    }

    pub fn with_scenes(self, scene_ref: impl Into<String>) -> Result<Self, StageOrderError> {
        if self.transcript_ref.is_none() {
            return Err(StageOrderError {
                attempted: Stage::DetectScenes,
                missing: Stage::Transcribe,
            });
        }
        Ok(Self {
            scene_ref: Some(scene_ref.into()),
            tag_ref: None,
            ..self
        })
    }

    pub fn with_tags(self, tag_ref: impl Into<String>) -> Result<Self, StageOrderError> {
        if self.scene_ref.is_none() {
            return Err(StageOrderError {
                attempted: Stage::GenerateTags,
                missing: Stage::DetectScenes,
            });
        }
        Ok(Self {
            tag_ref: Some(tag_ref.into()),
            ..self
        })
    }

    /// The next stage to run, or `None` once the chain has finished.
    pub fn next_stage(&self) -> Option<Stage> {
        if self.transcript_ref.is_none() {
            Some(Stage::Transcribe)
        } else if self.scene_ref.is_none() {
            Some(Stage::DetectScenes)
        } else if self.tag_ref.is_none() {
            Some(Stage::GenerateTags)
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        self.next_stage().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    #[serde(default)]
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    /// Transcript words spoken inside the scene.
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenesRecord {
    pub object_key: String,
    pub transcript_key: String,
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneTags {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagsRecord {
    pub object_key: String,
    pub tags: Vec<String>,
    pub scenes: Vec<SceneTags>,
}

/// Split `[0, duration)` at the given cut times and attach the words of each scene.
pub fn build_scenes(cuts: &[f64], duration: f64, transcript: &Transcript) -> Vec<Scene> {
    let mut bounds: Vec<f64> = cuts
        .iter()
        .copied()
        .filter(|t| *t > 0.0 && *t < duration)
        .collect();
    bounds.sort_by(|a, b| a.total_cmp(b));
    bounds.dedup();
    bounds.insert(0, 0.0);
    bounds.push(duration);

    bounds
        .windows(2)
        .filter(|pair| pair[1] > pair[0])
        .enumerate()
        .map(|(index, pair)| Scene {
            index,
            start: pair[0],
            end: pair[1],
            text: transcript
                .words
                .iter()
                .filter(|w| w.start >= pair[0] && w.start < pair[1])
                .map(|w| w.word.trim())
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect()
}

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "been", "before", "being", "could", "does", "doing",
    "from", "going", "have", "here", "into", "just", "know", "like", "more", "much", "only",
    "other", "over", "really", "right", "some", "that", "their", "them", "then", "there",
    "these", "they", "thing", "things", "think", "this", "those", "very", "want", "well",
    "were", "what", "when", "where", "which", "while", "will", "with", "would", "your",
];

/// Most frequent content words of `text`, most frequent first.
pub fn keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 4 && !STOPWORDS.contains(&t.as_str()))
    {
        *counts.entry(token).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(word, _)| word).collect()
}

pub fn tag_scenes(object_key: &str, scenes: &[Scene], per_scene: usize) -> TagsRecord {
    let all_text = scenes
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    TagsRecord {
        object_key: object_key.to_string(),
        tags: keywords(&all_text, per_scene * 2),
        scenes: scenes
            .iter()
            .map(|scene| SceneTags {
                index: scene.index,
                start: scene.start,
                end: scene.end,
                tags: keywords(&scene.text, per_scene),
            })
            .collect(),
    }
}
