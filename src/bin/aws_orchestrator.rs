//! AWS Orchestrator Binary
//!
//! Intended to run as a Lambda function triggered by S3 upload events. It
//! probes and plans the uploaded video, then schedules its analysis.
//!
//! Environment Variables:
//! - AWS_REGION: AWS region
//! - S3_BUCKET: S3 bucket for video storage
//! - SQS_QUEUE_URL: SQS queue URL for jobs
//! - DYNAMODB_TABLE: DynamoDB table for task records
//! - VIDEO_KEY: object key of the uploaded video
//! - SCHEDULE_ONLY: when `true`, only enqueue the processing job

use chronos::adapters::aws::{DynamoAdapter, S3Adapter, SqsAdapter};
use chronos::adapters::media::FfmpegAdapter;
use chronos::application::{OrchestratorService, TaskDispatcher};
use chronos::config::{AwsConfig, PipelineConfig};
use chronos::domain::jobs::{ProcessVideoJob, TaskId};
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    chronos::logging::init();
    let pipeline = PipelineConfig::from_env();
    let config = match AwsConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            process::exit(1);
        }
    };

    // In Lambda the key comes from the S3 event.
    let Ok(video_key) = std::env::var("VIDEO_KEY") else {
        error!("VIDEO_KEY env var not set");
        process::exit(1);
    };
    let schedule_only = std::env::var("SCHEDULE_ONLY")
        .map(|v| v == "true")
        .unwrap_or(false);

    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let storage = S3Adapter::new(aws_sdk_s3::Client::new(&sdk_config));
    let queue = SqsAdapter::new(aws_sdk_sqs::Client::new(&sdk_config), config.sqs_queue_url);
    let repo = DynamoAdapter::new(
        aws_sdk_dynamodb::Client::new(&sdk_config),
        config.dynamodb_table,
    );
    let tasks = TaskDispatcher::new(Arc::new(queue), Arc::new(repo));

    let orchestrator = OrchestratorService::new(
        storage,
        FfmpegAdapter::new(),
        tasks,
        pipeline.planner(),
        pipeline.scratch_root,
    );

    info!(bucket = %config.s3_bucket, object_key = %video_key, "processing new video");

    if schedule_only {
        match orchestrator.handle_new_video(&config.s3_bucket, &video_key).await {
            Ok(task_id) => info!(task_id = %task_id, "processing job enqueued"),
            Err(e) => {
                error!(error = %e, "failed to enqueue video");
                process::exit(1);
            }
        }
        return;
    }

    let job = ProcessVideoJob {
        id: TaskId::new(),
        bucket: config.s3_bucket.clone(),
        object_key: video_key,
    };
    match orchestrator.start_processing(&job).await {
        Ok(plan) => info!(task_id = %job.id, plan = ?plan, "analysis scheduled"),
        Err(e) => {
            error!(task_id = %job.id, error = %e, "processing failed");
            process::exit(1);
        }
    }
}
