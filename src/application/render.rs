//! Trim-then-concatenate rendering of clip lists.

use super::scratch::Scratch;
use super::tasks::TaskDispatcher;
use crate::domain::clips::{self, Clip};
use crate::domain::jobs::{RenderRemainingJob, RenderSelectedJob, TaskId, TaskKind, VideoTask};
use crate::domain::layout;
use crate::error::{PipelineError, PipelineResult};
use crate::ports::media::MediaPort;
use crate::ports::storage::StoragePort;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RenderOutcome {
    Rendered { rendered_key: String, clips: Vec<Clip> },
    /// Nothing left to render; not a failure.
    Nothing,
}

pub struct RenderService<S, M> {
    storage: S,
    media: M,
    tasks: TaskDispatcher,
    scratch_root: PathBuf,
}

/// Local copies of render sources, each downloaded at most once.
struct Sources<'a> {
    scratch: &'a Scratch,
    bucket: &'a str,
    paths: HashMap<String, PathBuf>,
}

impl<S, M> RenderService<S, M>
where
    S: StoragePort,
    M: MediaPort,
{
    pub fn new(storage: S, media: M, tasks: TaskDispatcher, scratch_root: PathBuf) -> Self {
        Self {
            storage,
            media,
            tasks,
            scratch_root,
        }
    }

    /// Render `clips` exactly in the order given. Overlaps are rendered as is.
    pub async fn render_selected(&self, job: &RenderSelectedJob) -> PipelineResult<RenderOutcome> {
        let seed = VideoTask::new(
            job.id.clone(),
            TaskKind::RenderSelected,
            &job.bucket,
            &job.source_key,
        );
        self.tasks
            .track(seed, describe, async {
                if job.clips.is_empty() {
                    return Ok(RenderOutcome::Nothing);
                }
                let scratch = Scratch::create(&self.scratch_root, "render", &job.source_key)?;
                let mut sources = Sources::new(&scratch, &job.bucket);
                self.render(&job.id, &mut sources, &job.source_key, &job.clips)
                    .await
            })
            .await
    }

    /// Render every part of the source not covered by `selected`, in time order.
    pub async fn render_remaining(
        &self,
        job: &RenderRemainingJob,
    ) -> PipelineResult<RenderOutcome> {
        let seed = VideoTask::new(
            job.id.clone(),
            TaskKind::RenderRemaining,
            &job.bucket,
            &job.source_key,
        );
        self.tasks
            .track(seed, describe, async {
                let scratch = Scratch::create(&self.scratch_root, "remaining", &job.source_key)?;
                let mut sources = Sources::new(&scratch, &job.bucket);

                let local = sources.fetch(&self.storage, &job.source_key).await?;
                let total = self
                    .media
                    .probe(&local)
                    .await
                    .map_err(|e| PipelineError::probe(format!("{}: {}", job.source_key, e)))?
                    .duration_seconds;
                self.tasks.record_duration(&job.id, total).await?;

                let gaps = clips::complement(&job.selected, total);
                info!(
                    task_id = %job.id,
                    selected = job.selected.len(),
                    gaps = gaps.len(),
                    total,
                    "computed remaining ranges"
                );
                if gaps.is_empty() {
                    return Ok(RenderOutcome::Nothing);
                }
                self.render(&job.id, &mut sources, &job.source_key, &gaps)
                    .await
            })
            .await
    }

    async fn render(
        &self,
        task_id: &TaskId,
        sources: &mut Sources<'_>,
        default_source: &str,
        clips: &[Clip],
    ) -> PipelineResult<RenderOutcome> {
        let ext = layout::extension(default_source);
        let trims_dir = sources.scratch.subdir("trims").await?;

        let mut trims = Vec::with_capacity(clips.len());
        for (i, clip) in clips.iter().enumerate() {
            let source_key = clip.source_or(default_source);
            let input = sources.fetch(&self.storage, source_key).await?;
            let output = trims_dir.join(format!("trim_{:03}.{}", i, ext));
            self.media
                .trim(&input, clip.start, clip.end, &output)
                .await
                .map_err(|e| {
                    PipelineError::render(format!("trim {} of {}: {}", clip, source_key, e))
                })?;
            trims.push(output);
        }

        let final_path = sources.scratch.path().join(format!("final.{}", ext));
        self.media
            .concat(&trims, &final_path)
            .await
            .map_err(|e| PipelineError::render(format!("concat of {} trims: {}", trims.len(), e)))?;

        let rendered_key = layout::rendered_key(task_id.as_str(), ext);
        self.storage
            .upload(&final_path, sources.bucket, &rendered_key)
            .await
            .map_err(|e| PipelineError::storage(format!("upload of {}: {}", rendered_key, e)))?;

        info!(task_id = %task_id, rendered_key = %rendered_key, clips = clips.len(), "render complete");
        Ok(RenderOutcome::Rendered {
            rendered_key,
            clips: clips.to_vec(),
        })
    }
}

impl<'a> Sources<'a> {
    fn new(scratch: &'a Scratch, bucket: &'a str) -> Self {
        Self {
            scratch,
            bucket,
            paths: HashMap::new(),
        }
    }

    async fn fetch<S: StoragePort>(&mut self, storage: &S, key: &str) -> PipelineResult<PathBuf> {
        if let Some(path) = self.paths.get(key) {
            return Ok(path.clone());
        }
        // numbered so that equal base names from different prefixes never clash
        let name = format!("{:02}_{}", self.paths.len(), layout::base_name(key));
        let path = self.scratch.file_in("sources", &name).await?;
        storage
            .download(self.bucket, key, &path)
            .await
            .map_err(|e| PipelineError::storage(format!("download of {}: {}", key, e)))?;
        self.paths.insert(key.to_string(), path.clone());
        Ok(path)
    }
}

fn describe(outcome: &RenderOutcome) -> String {
    match outcome {
        RenderOutcome::Rendered { rendered_key, clips } => {
            format!("Rendered {} clips to {}", clips.len(), rendered_key)
        }
        RenderOutcome::Nothing => "Nothing to render".to_string(),
    }
}
