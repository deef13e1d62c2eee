use super::analysis::AnalysisChain;
use super::orchestrator::OrchestratorService;
use super::render::RenderService;
use super::tasks::TaskDispatcher;
use crate::domain::jobs::Job;
use crate::domain::planner::SegmentationPlanner;
use crate::error::PipelineResult;
use crate::ports::media::MediaPort;
use crate::ports::queue::JobQueuePort;
use crate::ports::speech::SpeechPort;
use crate::ports::storage::StoragePort;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// How long one dequeue may block before the loop polls again.
const DEQUEUE_TIMEOUT_SECS: f64 = 5.0;

/// Pulls jobs off the queue and routes each to the service that owns it.
pub struct WorkerService<S, M, T> {
    queue: Arc<dyn JobQueuePort>,
    orchestrator: OrchestratorService<S, M>,
    analysis: AnalysisChain<S, M, T>,
    render: RenderService<S, M>,
}

impl<S, M, T> WorkerService<S, M, T>
where
    S: StoragePort + Clone + 'static,
    M: MediaPort + Clone + 'static,
    T: SpeechPort + 'static,
{
    pub fn new(
        storage: S,
        media: M,
        speech: T,
        queue: Arc<dyn JobQueuePort>,
        tasks: TaskDispatcher,
        planner: SegmentationPlanner,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            queue,
            orchestrator: OrchestratorService::new(
                storage.clone(),
                media.clone(),
                tasks.clone(),
                planner,
                scratch_root.clone(),
            ),
            analysis: AnalysisChain::new(
                storage.clone(),
                media.clone(),
                speech,
                tasks.clone(),
                scratch_root.clone(),
            ),
            render: RenderService::new(storage, media, tasks, scratch_root),
        }
    }

    pub async fn run_worker_loop(&self, worker_id: usize) {
        info!(worker_id, "worker started");
        loop {
            match self.queue.dequeue_job(DEQUEUE_TIMEOUT_SECS).await {
                Ok(Some(job)) => {
                    // the owning service has already recorded FAILURE
                    if let Err(e) = self.process_job(&job).await {
                        error!(worker_id, task_id = %job.task_id(), error = %e, "job failed");
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!(worker_id, error = %e, "queue error");
                    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                }
            }
        }
    }

    pub async fn process_job(&self, job: &Job) -> PipelineResult<()> {
        info!(task_id = %job.task_id(), kind = ?job.kind(), object_key = job.object_key(), "processing job");
        match job {
            Job::ProcessVideo(j) => self.orchestrator.start_processing(j).await.map(drop),
            Job::SegmentVideo(j) => self.orchestrator.segment_video(j).await.map(drop),
            Job::AnalyzeChunk(j) => self.analysis.analyze_chunk(j).await.map(drop),
            Job::RenderSelected(j) => self.render.render_selected(j).await.map(drop),
            Job::RenderRemaining(j) => self.render.render_remaining(j).await.map(drop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::TagsRecord;
    use crate::domain::jobs::TaskState;
    use crate::testing::{FakeMedia, FakeSpeech, Harness};
    use tempfile::tempdir;

    async fn drain<S, M, T>(harness: &Harness, worker: &WorkerService<S, M, T>) -> Vec<Job>
    where
        S: StoragePort + Clone + 'static,
        M: MediaPort + Clone + 'static,
        T: SpeechPort + 'static,
    {
        let mut done = Vec::new();
        while let Some(job) = harness.queue.dequeue_job(0.0).await.unwrap() {
            worker.process_job(&job).await.unwrap();
            done.push(job);
        }
        done
    }

    #[tokio::test]
    async fn test_long_video_flows_through_every_job() {
        let harness = Harness::new();
        let scratch = tempdir().unwrap();
        harness.storage.insert("videos", "uploads/talk.mp4", b"source");
        let worker = WorkerService::new(
            harness.storage.clone(),
            FakeMedia::with_duration(1300.0).with_cuts(&[100.0]),
            FakeSpeech::saying(&[("closures", 1.0), ("closures", 2.0)]),
            Arc::new(harness.queue.clone()),
            harness.tasks.clone(),
            SegmentationPlanner::default(),
            scratch.path().to_path_buf(),
        );

        let id = harness
            .tasks
            .schedule(Job::process_video("videos", "uploads/talk.mp4"))
            .await
            .unwrap();
        let done = drain(&harness, &worker).await;

        // process, segment, then one analysis per segment
        assert_eq!(done.len(), 5);
        for job in &done {
            let status = harness.tasks.status(job.task_id()).await.unwrap();
            assert_eq!(status.state, TaskState::Success, "{:?}", job);
        }
        assert_eq!(
            harness.tasks.status(&id).await.unwrap().state,
            TaskState::Success
        );

        let tags: TagsRecord = serde_json::from_slice(
            &harness.storage.object("videos", "tags/talk_002.json").unwrap(),
        )
        .unwrap();
        assert_eq!(tags.object_key, "segments/talk.mp4/talk_002.mp4");
        assert_eq!(tags.tags, vec!["closures"]);
    }

    #[tokio::test]
    async fn test_failed_job_is_reported_and_recorded() {
        let harness = Harness::new();
        let scratch = tempdir().unwrap();
        let worker = WorkerService::new(
            harness.storage.clone(),
            FakeMedia::with_duration(10.0),
            FakeSpeech::saying(&[]),
            Arc::new(harness.queue.clone()),
            harness.tasks.clone(),
            SegmentationPlanner::default(),
            scratch.path().to_path_buf(),
        );
        let job = Job::process_video("videos", "never-uploaded.mp4");
        harness.tasks.schedule(job.clone()).await.unwrap();

        assert!(worker.process_job(&job).await.is_err());
        assert_eq!(
            harness.tasks.status(job.task_id()).await.unwrap().state,
            TaskState::Failure
        );
    }
}
