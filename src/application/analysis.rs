//! Transcribe -> DetectScenes -> GenerateTags over one chunk.

use super::scratch::Scratch;
use super::tasks::TaskDispatcher;
use crate::domain::analysis::{
    build_scenes, tag_scenes, AnalysisResult, ScenesRecord, Stage, Transcript,
};
use crate::domain::jobs::{AnalyzeChunkJob, TaskKind, VideoTask};
use crate::domain::layout;
use crate::error::{ChainError, PipelineError, PipelineResult};
use crate::ports::media::MediaPort;
use crate::ports::speech::SpeechPort;
use crate::ports::storage::StoragePort;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, instrument};

const TAGS_PER_SCENE: usize = 5;
const JSON: &str = "application/json";

pub struct AnalysisChain<S, M, T> {
    storage: S,
    media: M,
    speech: T,
    tasks: TaskDispatcher,
    scratch_root: PathBuf,
}

type StageResult<T> = Result<T, ChainError>;

impl<S, M, T> AnalysisChain<S, M, T>
where
    S: StoragePort,
    M: MediaPort,
    T: SpeechPort,
{
    pub fn new(
        storage: S,
        media: M,
        speech: T,
        tasks: TaskDispatcher,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            storage,
            media,
            speech,
            tasks,
            scratch_root,
        }
    }

    /// Run every stage in order. The first failing stage ends the chain.
    pub async fn run(&self, bucket: &str, object_key: &str) -> StageResult<AnalysisResult> {
        let mut result = AnalysisResult::new(object_key);
        while let Some(stage) = result.next_stage() {
            result = self.run_stage(stage, bucket, result).await?;
        }
        Ok(result)
    }

    /// The chain as a tracked task, reporting each stage as it starts.
    pub async fn analyze_chunk(&self, job: &AnalyzeChunkJob) -> PipelineResult<AnalysisResult> {
        let seed = VideoTask::new(
            job.id.clone(),
            TaskKind::AnalyzeChunk,
            &job.bucket,
            &job.object_key,
        );
        self.tasks
            .track(
                seed,
                |result| format!("Analysis complete for {}", result.object_key()),
                async {
                    let mut result = AnalysisResult::new(&job.object_key);
                    while let Some(stage) = result.next_stage() {
                        self.tasks
                            .progress(&job.id, format!("Running stage {}", stage))
                            .await?;
                        result = self.run_stage(stage, &job.bucket, result).await?;
                    }
                    Ok::<_, PipelineError>(result)
                },
            )
            .await
    }

    #[instrument(skip(self, result), fields(object_key = result.object_key()))]
    async fn run_stage(
        &self,
        stage: Stage,
        bucket: &str,
        result: AnalysisResult,
    ) -> StageResult<AnalysisResult> {
        let next = match stage {
            Stage::Transcribe => self.transcribe(bucket, result).await?,
            Stage::DetectScenes => self.detect_scenes(bucket, result).await?,
            Stage::GenerateTags => self.generate_tags(bucket, result).await?,
        };
        info!(%stage, "stage complete");
        Ok(next)
    }

    async fn transcribe(&self, bucket: &str, result: AnalysisResult) -> StageResult<AnalysisResult> {
        let stage = Stage::Transcribe;
        let key = result.object_key();
        let scratch = self.scratch(stage, key)?;
        let local = self.download(stage, &scratch, bucket, key).await?;

        let transcript = self
            .speech
            .transcribe(&local)
            .await
            .map_err(|e| ChainError::new(stage, format!("transcription of {}: {}", key, e)))?;

        let transcript_key = layout::transcript_key(key);
        self.put_json(stage, bucket, &transcript_key, &transcript)
            .await?;
        Ok(result.with_transcript(transcript_key))
    }

    async fn detect_scenes(
        &self,
        bucket: &str,
        result: AnalysisResult,
    ) -> StageResult<AnalysisResult> {
        let stage = Stage::DetectScenes;
        let key = result.object_key();
        let transcript_key = result
            .transcript_ref()
            .ok_or_else(|| ChainError::new(stage, "transcript reference missing"))?;
        let transcript: Transcript = self.get_json(stage, bucket, transcript_key).await?;

        let scratch = self.scratch(stage, key)?;
        let local = self.download(stage, &scratch, bucket, key).await?;
        let cuts = self
            .media
            .scene_cuts(&local)
            .await
            .map_err(|e| ChainError::new(stage, format!("scene detection on {}: {}", key, e)))?;
        let duration = self
            .media
            .probe(&local)
            .await
            .map_err(|e| ChainError::new(stage, format!("probe of {}: {}", key, e)))?
            .duration_seconds;

        let record = ScenesRecord {
            object_key: key.to_string(),
            transcript_key: transcript_key.to_string(),
            scenes: build_scenes(&cuts, duration, &transcript),
        };
        let scenes_key = layout::scenes_key(key);
        self.put_json(stage, bucket, &scenes_key, &record).await?;
        Ok(result.with_scenes(scenes_key)?)
    }

    async fn generate_tags(
        &self,
        bucket: &str,
        result: AnalysisResult,
    ) -> StageResult<AnalysisResult> {
        let stage = Stage::GenerateTags;
        let key = result.object_key();
        let scenes_key = result
            .scene_ref()
            .ok_or_else(|| ChainError::new(stage, "scene reference missing"))?;
        let record: ScenesRecord = self.get_json(stage, bucket, scenes_key).await?;

        let tags = tag_scenes(key, &record.scenes, TAGS_PER_SCENE);
        let tags_key = layout::tags_key(key);
        self.put_json(stage, bucket, &tags_key, &tags).await?;
        Ok(result.with_tags(tags_key)?)
    }

    fn scratch(&self, stage: Stage, key: &str) -> StageResult<Scratch> {
        Scratch::create(&self.scratch_root, stage.as_str(), key)
            .map_err(|e| ChainError::new(stage, e.to_string()))
    }

    async fn download(
        &self,
        stage: Stage,
        scratch: &Scratch,
        bucket: &str,
        key: &str,
    ) -> StageResult<PathBuf> {
        let local = scratch.path().join(layout::base_name(key));
        self.storage
            .download(bucket, key, &local)
            .await
            .map_err(|e| ChainError::new(stage, format!("download of {}: {}", key, e)))?;
        Ok(local)
    }

    async fn get_json<V: DeserializeOwned>(
        &self,
        stage: Stage,
        bucket: &str,
        key: &str,
    ) -> StageResult<V> {
        let body = self
            .storage
            .get(bucket, key)
            .await
            .map_err(|e| ChainError::new(stage, format!("reading {}: {}", key, e)))?;
        serde_json::from_slice(&body)
            .map_err(|e| ChainError::new(stage, format!("decoding {}: {}", key, e)))
    }

    async fn put_json<V: Serialize + Sync>(
        &self,
        stage: Stage,
        bucket: &str,
        key: &str,
        value: &V,
    ) -> StageResult<()> {
        let body = serde_json::to_vec_pretty(value)
            .map_err(|e| ChainError::new(stage, e.to_string()))?;
        self.storage
            .put(bucket, key, Bytes::from(body), JSON)
            .await
            .map_err(|e| ChainError::new(stage, format!("writing {}: {}", key, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::TagsRecord;
    use crate::domain::jobs::{Job, TaskId, TaskState};
    use crate::ports::media::MockMediaPort;
    use crate::ports::speech::MockSpeechPort;
    use crate::testing::{FakeMedia, FakeSpeech, Harness};
    use tempfile::tempdir;

    const CHUNK: &str = "segments/talk.mp4/talk_001.mp4";

    fn speech() -> FakeSpeech {
        FakeSpeech::saying(&[
            ("welcome", 1.0),
            ("rustaceans", 2.0),
            ("ownership", 12.0),
            ("ownership", 14.0),
            ("borrowing", 15.0),
        ])
    }

    #[tokio::test]
    async fn test_chain_fills_every_reference() {
        let harness = Harness::new();
        harness.storage.insert("videos", CHUNK, b"chunk");
        let scratch = tempdir().unwrap();
        let chain = AnalysisChain::new(
            harness.storage.clone(),
            FakeMedia::with_duration(20.0).with_cuts(&[10.0]),
            speech(),
            harness.tasks.clone(),
            scratch.path().to_path_buf(),
        );

        let result = chain.run("videos", CHUNK).await.unwrap();

        assert!(result.is_complete());
        assert_eq!(result.transcript_ref(), Some("transcripts/talk_001.json"));
        assert_eq!(result.scene_ref(), Some("scenes/talk_001.json"));
        assert_eq!(result.tag_ref(), Some("tags/talk_001.json"));

        let scenes: ScenesRecord =
            serde_json::from_slice(&harness.storage.object("videos", "scenes/talk_001.json").unwrap())
                .unwrap();
        assert_eq!(scenes.scenes.len(), 2);
        assert_eq!(scenes.scenes[0].text, "welcome rustaceans");

        let tags: TagsRecord =
            serde_json::from_slice(&harness.storage.object("videos", "tags/talk_001.json").unwrap())
                .unwrap();
        assert_eq!(tags.tags[0], "ownership");
        assert_eq!(tags.scenes[1].tags, vec!["ownership", "borrowing"]);

        assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_transcribe_failure_stops_the_chain() {
        let harness = Harness::new();
        harness.storage.insert("videos", CHUNK, b"chunk");
        let scratch = tempdir().unwrap();

        let mut speech = MockSpeechPort::new();
        speech
            .expect_transcribe()
            .times(1)
            .returning(|_| Err("model crashed".into()));
        let mut media = MockMediaPort::new();
        media.expect_scene_cuts().times(0);
        media.expect_probe().times(0);

        let chain = AnalysisChain::new(
            harness.storage.clone(),
            media,
            speech,
            harness.tasks.clone(),
            scratch.path().to_path_buf(),
        );

        let err = chain.run("videos", CHUNK).await.unwrap_err();

        assert_eq!(err.stage, Stage::Transcribe);
        assert!(err.message.contains("model crashed"));
        assert!(harness.storage.list("videos", "scenes/").is_empty());
        assert!(harness.storage.list("videos", "tags/").is_empty());
        assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_scene_failure_keeps_transcript_and_names_stage() {
        let harness = Harness::new();
        harness.storage.insert("videos", CHUNK, b"chunk");
        let scratch = tempdir().unwrap();
        let mut media = MockMediaPort::new();
        media
            .expect_scene_cuts()
            .returning(|_| Err("filter graph error".into()));

        let chain = AnalysisChain::new(
            harness.storage.clone(),
            media,
            speech(),
            harness.tasks.clone(),
            scratch.path().to_path_buf(),
        );

        let job = match Job::analyze_chunk("videos", CHUNK) {
            Job::AnalyzeChunk(job) => job,
            _ => unreachable!(),
        };
        harness.tasks.schedule(Job::AnalyzeChunk(job.clone())).await.unwrap();

        let err = chain.analyze_chunk(&job).await.unwrap_err();

        match err {
            PipelineError::Chain(chain_err) => assert_eq!(chain_err.stage, Stage::DetectScenes),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(harness.storage.object("videos", "transcripts/talk_001.json").is_some());
        assert!(harness.storage.list("videos", "tags/").is_empty());

        let status = harness.tasks.status(&job.id).await.unwrap();
        assert_eq!(status.state, TaskState::Failure);
        assert!(status.detail.starts_with("Stage detect_scenes failed"));
    }

    #[tokio::test]
    async fn test_analyze_chunk_records_success() {
        let harness = Harness::new();
        harness.storage.insert("videos", "talk.mp4", b"chunk");
        let scratch = tempdir().unwrap();
        let chain = AnalysisChain::new(
            harness.storage.clone(),
            FakeMedia::with_duration(30.0),
            speech(),
            harness.tasks.clone(),
            scratch.path().to_path_buf(),
        );
        let job = AnalyzeChunkJob {
            id: TaskId::new(),
            bucket: "videos".into(),
            object_key: "talk.mp4".into(),
        };

        chain.analyze_chunk(&job).await.unwrap();

        let task = harness.tasks.task(&job.id).await.unwrap();
        assert_eq!(task.status, TaskState::Success);
        let result: AnalysisResult = serde_json::from_value(task.result.unwrap()).unwrap();
        assert_eq!(result.tag_ref(), Some("tags/talk.json"));
    }
}
