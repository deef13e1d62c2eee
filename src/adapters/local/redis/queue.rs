//! Redis JobQueuePort implementation.

use super::error::QueueError;
use super::pool::RedisPool;
use super::{JOB_QUEUE_INTERACTIVE, JOB_QUEUE_PIPELINE};
use crate::domain::jobs::Job;
use crate::error::PortError;
use crate::ports::queue::JobQueuePort;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;

/// Renders are requested by someone waiting on the result; they jump the
/// pipeline backlog.
fn queue_for(job: &Job) -> &'static str {
    match job {
        Job::RenderSelected(_) | Job::RenderRemaining(_) => JOB_QUEUE_INTERACTIVE,
        Job::ProcessVideo(_) | Job::SegmentVideo(_) | Job::AnalyzeChunk(_) => JOB_QUEUE_PIPELINE,
    }
}

/// BRPOP serves the first non-empty list in key order.
const DEQUEUE_ORDER: [&str; 2] = [JOB_QUEUE_INTERACTIVE, JOB_QUEUE_PIPELINE];

#[async_trait]
impl JobQueuePort for RedisPool {
    async fn enqueue_job(&self, job: Job) -> Result<(), PortError> {
        let mut conn = self.pool.get().await.map_err(QueueError::from)?;
        let json = serde_json::to_string(&job)?;

        conn.lpush::<_, _, ()>(queue_for(&job), json)
            .await
            .map_err(QueueError::from)?;
        Ok(())
    }

    async fn dequeue_job(&self, timeout_secs: f64) -> Result<Option<Job>, PortError> {
        let mut conn = self.pool.get().await.map_err(QueueError::from)?;

        let result: Option<(String, String)> = conn
            .brpop(&DEQUEUE_ORDER[..], timeout_secs)
            .await
            .map_err(QueueError::from)?;
        match result {
            Some((_, json)) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
