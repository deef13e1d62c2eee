//! AWS Worker Binary
//!
//! Intended to run as a long-lived container (ECS/Batch) that:
//! 1. Connects to AWS services (S3, SQS, DynamoDB).
//! 2. Runs the WorkerService loop over segmentation, analysis and render jobs.
//!
//! Environment Variables:
//! - AWS_REGION: AWS region (e.g., us-east-1)
//! - S3_BUCKET: S3 bucket for video storage
//! - SQS_QUEUE_URL: SQS queue URL for jobs
//! - DYNAMODB_TABLE: DynamoDB table for task records
//! - SPEECH_URL / SPEECH_API_KEY: transcription endpoint

use chronos::adapters::aws::{DynamoAdapter, S3Adapter, SqsAdapter};
use chronos::adapters::media::FfmpegAdapter;
use chronos::adapters::remote::HttpTranscriber;
use chronos::application::{TaskDispatcher, WorkerService};
use chronos::config::{AwsConfig, PipelineConfig};
use chronos::ports::queue::JobQueuePort;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_SPEECH_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

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

    let speech_url = std::env::var("SPEECH_URL").unwrap_or_else(|_| DEFAULT_SPEECH_URL.into());
    let speech = match HttpTranscriber::new(speech_url, std::env::var("SPEECH_API_KEY").ok()) {
        Ok(speech) => speech,
        Err(e) => {
            error!(error = %e, "failed to build speech client");
            process::exit(1);
        }
    };

    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let storage = S3Adapter::new(aws_sdk_s3::Client::new(&sdk_config));
    let queue: Arc<dyn JobQueuePort> = Arc::new(SqsAdapter::new(
        aws_sdk_sqs::Client::new(&sdk_config),
        config.sqs_queue_url,
    ));
    let repo = Arc::new(DynamoAdapter::new(
        aws_sdk_dynamodb::Client::new(&sdk_config),
        config.dynamodb_table,
    ));
    let tasks = TaskDispatcher::new(queue.clone(), repo);

    let worker = Arc::new(WorkerService::new(
        storage,
        FfmpegAdapter::new(),
        speech,
        queue,
        tasks,
        pipeline.planner(),
        pipeline.scratch_root.clone(),
    ));

    info!(bucket = %config.s3_bucket, workers = pipeline.worker_count, "AWS worker polling for jobs");

    let handles: Vec<_> = (0..pipeline.worker_count)
        .map(|i| {
            let w = worker.clone();
            tokio::spawn(async move { w.run_worker_loop(i).await })
        })
        .collect();
    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            error!(error = %e, "worker task ended abnormally");
        }
    }
}
