use super::scratch::Scratch;
use super::tasks::TaskDispatcher;
use crate::domain::jobs::{
    Job, ProcessVideoJob, SegmentVideoJob, TaskId, TaskKind, VideoTask,
};
use crate::domain::layout;
use crate::domain::planner::{PlanResult, SegmentationPlanner};
use crate::domain::segments::{self, Segment};
use crate::error::{PipelineError, PipelineResult};
use crate::ports::media::MediaPort;
use crate::ports::storage::StoragePort;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Decides how an uploaded video is decomposed and schedules its analysis.
pub struct OrchestratorService<S, M> {
    storage: S,
    media: M,
    tasks: TaskDispatcher,
    planner: SegmentationPlanner,
    scratch_root: PathBuf,
}

impl<S, M> OrchestratorService<S, M>
where
    S: StoragePort,
    M: MediaPort,
{
    pub fn new(
        storage: S,
        media: M,
        tasks: TaskDispatcher,
        planner: SegmentationPlanner,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            storage,
            media,
            tasks,
            planner,
            scratch_root,
        }
    }

    /// Schedule processing of a freshly uploaded object.
    pub async fn handle_new_video(&self, bucket: &str, object_key: &str) -> PipelineResult<TaskId> {
        self.tasks.schedule(Job::process_video(bucket, object_key)).await
    }

    /// PENDING -> PROGRESS, probe, plan, then schedule either one analysis
    /// chain or the segmentation job. Ends SUCCESS once work is scheduled.
    pub async fn start_processing(&self, job: &ProcessVideoJob) -> PipelineResult<PlanResult> {
        let seed = VideoTask::new(
            job.id.clone(),
            TaskKind::ProcessVideo,
            &job.bucket,
            &job.object_key,
        );
        self.tasks
            .track(
                seed,
                |plan| match plan {
                    PlanResult::Direct => "Orchestration started: direct analysis".to_string(),
                    PlanResult::Segmented { expected_count, .. } => format!(
                        "Orchestration started: segmenting into {} chunks",
                        expected_count
                    ),
                },
                self.probe_and_dispatch(job),
            )
            .await
    }

    async fn probe_and_dispatch(&self, job: &ProcessVideoJob) -> PipelineResult<PlanResult> {
        let (bucket, key) = (job.bucket.as_str(), job.object_key.as_str());
        self.ensure_storage(bucket).await?;

        // Removed when this function returns, whichever way
        let scratch = Scratch::create(&self.scratch_root, "probe", key)?;
        let local_path = scratch.path().join(layout::base_name(key));

        self.tasks
            .progress(&job.id, "Downloading video from storage...")
            .await?;
        self.download(bucket, key, &local_path).await?;

        self.tasks.progress(&job.id, "Probing video duration...").await?;
        let duration = self
            .media
            .probe(&local_path)
            .await
            .map_err(|e| PipelineError::probe(format!("{}: {}", key, e)))?
            .duration_seconds;
        self.tasks.record_duration(&job.id, duration).await?;
        info!(task_id = %job.id, object_key = key, duration, "probed video");

        let plan = self.planner.plan(duration);
        match &plan {
            PlanResult::Direct => {
                self.tasks
                    .progress(
                        &job.id,
                        format!("Video is short ({}s). Processing directly.", duration),
                    )
                    .await?;
                self.tasks.schedule(Job::analyze_chunk(bucket, key)).await?;
            }
            PlanResult::Segmented { .. } => {
                self.tasks
                    .progress(
                        &job.id,
                        format!("Video is long ({}s). Queueing for segmentation.", duration),
                    )
                    .await?;
                self.tasks
                    .schedule(Job::SegmentVideo(SegmentVideoJob {
                        id: TaskId::new(),
                        bucket: bucket.to_string(),
                        object_key: key.to_string(),
                        duration_seconds: duration,
                        plan: plan.clone(),
                    }))
                    .await?;
            }
        }
        Ok(plan)
    }

    /// Split the source into overlapping segments, upload each, and schedule
    /// one analysis chain per segment in temporal order.
    pub async fn segment_video(&self, job: &SegmentVideoJob) -> PipelineResult<Vec<Segment>> {
        let seed = VideoTask::new(
            job.id.clone(),
            TaskKind::SegmentVideo,
            &job.bucket,
            &job.object_key,
        );
        self.tasks
            .track(
                seed,
                |segments| {
                    format!(
                        "segmentation complete, {} chunks created",
                        segments.len()
                    )
                },
                self.split_and_dispatch(job),
            )
            .await
    }

    async fn split_and_dispatch(&self, job: &SegmentVideoJob) -> PipelineResult<Vec<Segment>> {
        let (bucket, key) = (job.bucket.as_str(), job.object_key.as_str());
        self.ensure_storage(bucket).await?;

        let scratch = Scratch::create(&self.scratch_root, "segment", key)?;
        let local_path = scratch.file_in("source", layout::base_name(key)).await?;
        let output_dir = scratch.subdir("segments").await?;

        self.tasks
            .progress(&job.id, format!("Downloading {} for segmentation.", key))
            .await?;
        self.download(bucket, key, &local_path).await?;

        let planner = match job.plan {
            PlanResult::Segmented {
                segment_duration_seconds,
                overlap_seconds,
                ..
            } => SegmentationPlanner::new(
                self.planner.threshold_seconds,
                segment_duration_seconds,
                overlap_seconds,
            ),
            PlanResult::Direct => self.planner,
        };
        let windows = planner.windows(job.duration_seconds);

        self.tasks
            .progress(&job.id, "Running ffmpeg for segmentation.")
            .await?;
        let produced = self
            .media
            .segment(&local_path, &windows, &output_dir, key)
            .await
            .map_err(|e| PipelineError::transcode(format!("segmenting {}: {}", key, e)))?;

        let found = list_dir(&output_dir).await?;
        let discovered = segments::discover(key, &found);
        if discovered.len() != produced.len() {
            warn!(
                object_key = key,
                reported = produced.len(),
                found = discovered.len(),
                "segmenter output does not match its report"
            );
        }
        if discovered.is_empty() {
            return Err(PipelineError::transcode(format!(
                "no segments produced for {}",
                key
            )));
        }

        self.tasks
            .progress(&job.id, "Uploading segments.")
            .await?;
        // uploads that succeed before a failure are left in place
        let mut created = Vec::with_capacity(discovered.len());
        for produced in discovered {
            let window = windows.get(produced.index).ok_or_else(|| {
                PipelineError::transcode(format!(
                    "unexpected segment index {} for {}",
                    produced.index, key
                ))
            })?;
            let segment = Segment::from_window(key, window);

            self.storage
                .upload(&produced.local_path, bucket, &segment.storage_key)
                .await
                .map_err(|e| {
                    PipelineError::storage(format!("upload of {}: {}", segment.storage_key, e))
                })?;
            created.push(segment);
        }
        self.confirm_uploaded(bucket, key, &created).await?;

        self.tasks
            .progress(&job.id, "Queueing analysis of each segment.")
            .await?;
        for segment in &created {
            self.tasks
                .schedule(Job::analyze_chunk(bucket, segment.storage_key.clone()))
                .await?;
        }

        info!(
            task_id = %job.id,
            object_key = key,
            segments = created.len(),
            "segmented video"
        );
        Ok(created)
    }

    /// Every uploaded segment must be listed under the parent's prefix
    /// before any analysis is scheduled for it.
    async fn confirm_uploaded(
        &self,
        bucket: &str,
        parent_key: &str,
        segments: &[Segment],
    ) -> PipelineResult<()> {
        let prefix = layout::segment_prefix(parent_key);
        let listed: HashSet<String> = self
            .storage
            .list_by_prefix(bucket, &prefix)
            .await
            .map_err(|e| PipelineError::storage(format!("listing {}: {}", prefix, e)))?
            .into_iter()
            .collect();
        match segments.iter().find(|s| !listed.contains(&s.storage_key)) {
            Some(missing) => Err(PipelineError::storage(format!(
                "uploaded segment {} is not listed",
                missing.storage_key
            ))),
            None => Ok(()),
        }
    }

    async fn ensure_storage(&self, bucket: &str) -> PipelineResult<()> {
        self.storage
            .check(bucket)
            .await
            .map_err(|e| PipelineError::unavailable(format!("storage bucket {}: {}", bucket, e)))
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> PipelineResult<()> {
        self.storage
            .download(bucket, key, local_path)
            .await
            .map_err(|e| PipelineError::storage(format!("download of {}: {}", key, e)))
    }
}

async fn list_dir(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    Ok(paths)
}
