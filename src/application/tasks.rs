//! Scheduling of jobs and bookkeeping of their status records.

use crate::domain::jobs::{Job, TaskId, TaskState, TaskStatus, VideoTask};
use crate::error::{PipelineError, PipelineResult};
use crate::ports::queue::JobQueuePort;
use crate::ports::repository::TaskRepository;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct TaskDispatcher {
    queue: Arc<dyn JobQueuePort>,
    repo: Arc<dyn TaskRepository>,
}

impl TaskDispatcher {
    pub fn new(queue: Arc<dyn JobQueuePort>, repo: Arc<dyn TaskRepository>) -> Self {
        Self { queue, repo }
    }

    /// Record the job as PENDING and hand it to the queue.
    pub async fn schedule(&self, job: Job) -> PipelineResult<TaskId> {
        let id = job.task_id().clone();
        self.save(&VideoTask::pending(&job)).await?;
        info!(task_id = %id, kind = ?job.kind(), object_key = job.object_key(), "scheduling job");
        self.queue
            .enqueue_job(job)
            .await
            .map_err(|e| PipelineError::queue(format!("failed to enqueue task {}: {}", id, e)))?;
        Ok(id)
    }

    pub async fn status(&self, id: &TaskId) -> PipelineResult<TaskStatus> {
        Ok(TaskStatus::from(&self.task(id).await?))
    }

    pub async fn task(&self, id: &TaskId) -> PipelineResult<VideoTask> {
        self.repo
            .get_task(id)
            .await
            .map_err(|e| PipelineError::repository(e.to_string()))?
            .ok_or_else(|| PipelineError::TaskNotFound(id.to_string()))
    }

    async fn save(&self, task: &VideoTask) -> PipelineResult<()> {
        self.repo
            .save_task(task)
            .await
            .map_err(|e| PipelineError::repository(e.to_string()))
    }

    async fn update<F>(&self, id: &TaskId, apply: F) -> PipelineResult<()>
    where
        F: FnOnce(&mut VideoTask),
    {
        let mut task = self.task(id).await?;
        apply(&mut task);
        self.save(&task).await
    }

    pub async fn progress(&self, id: &TaskId, detail: impl Into<String>) -> PipelineResult<()> {
        let detail = detail.into();
        info!(task_id = %id, "{}", detail);
        self.update(id, |task| {
            task.status = TaskState::Progress;
            task.status_detail = detail;
        })
        .await
    }

    pub async fn record_duration(&self, id: &TaskId, duration_seconds: f64) -> PipelineResult<()> {
        self.update(id, |task| task.duration_seconds = Some(duration_seconds))
            .await
    }

    /// Run `work` as the body of task `seed`: PROGRESS while it runs, then
    /// SUCCESS with its output or FAILURE with its error, which is returned.
    pub async fn track<T, Fut, D>(&self, seed: VideoTask, describe: D, work: Fut) -> PipelineResult<T>
    where
        T: Serialize,
        Fut: Future<Output = PipelineResult<T>>,
        D: FnOnce(&T) -> String,
    {
        let id = seed.id.clone();
        let mut task = self
            .repo
            .get_task(&id)
            .await
            .map_err(|e| PipelineError::repository(e.to_string()))?
            .unwrap_or(seed);
        task.status = TaskState::Progress;
        task.status_detail = "Started".to_string();
        task.result = None;
        self.save(&task).await?;

        match work.await {
            Ok(output) => {
                let detail = describe(&output);
                let result = serde_json::to_value(&output)?;
                info!(task_id = %id, "{}", detail);
                self.update(&id, |task| {
                    task.status = TaskState::Success;
                    task.status_detail = detail;
                    task.result = Some(result);
                })
                .await?;
                Ok(output)
            }
            Err(err) => {
                let detail = err.to_string();
                error!(task_id = %id, error = %detail, "task failed");
                if let Err(save_err) = self
                    .update(&id, |task| {
                        task.status = TaskState::Failure;
                        task.status_detail = detail;
                    })
                    .await
                {
                    error!(task_id = %id, error = %save_err, "could not record task failure");
                }
                Err(err)
            }
        }
    }
}
