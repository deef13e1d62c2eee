//! Redis adapter for local deployment.
//!
//! This module provides Redis-backed implementations of:
//! - `JobQueuePort` for job enqueueing/dequeueing
//! - `TaskRepository` for task status records

mod error;
mod pool;
mod queue;
mod repository;

pub use error::QueueError;
pub use pool::RedisPool;

/// Redis key constants
const JOB_QUEUE_INTERACTIVE: &str = "chronos:jobs:interactive";
const JOB_QUEUE_PIPELINE: &str = "chronos:jobs:pipeline";
const TASK_PREFIX: &str = "chronos:task:";

/// Task records expire a week after their last update.
const TASK_TTL_SECS: u64 = 7 * 24 * 60 * 60;
