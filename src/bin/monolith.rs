//! Monolith Binary - Local deployment
//!
//! Wires up:
//! - Local adapters (filesystem storage, Redis queue and task records)
//! - ffmpeg media, HTTP speech-to-text and Gemini inference
//! - In-process workers and the HTTP control surface

use chronos::adapters::local::{router, AppState, FsAdapter, RedisPool};
use chronos::adapters::media::FfmpegAdapter;
use chronos::adapters::remote::{GeminiClient, HttpTranscriber};
use chronos::application::{QueryService, TaskDispatcher, WorkerService};
use chronos::config::{LocalConfig, PipelineConfig};
use chronos::domain::credentials::CredentialPool;
use chronos::ports::queue::JobQueuePort;
use chronos::ports::repository::TaskRepository;
use std::process;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    chronos::logging::init();
    let pipeline = PipelineConfig::from_env();
    let config = LocalConfig::from_env();

    // 1. Adapters (Local implementations)
    let redis = match RedisPool::new(&config.redis_url) {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "failed to create Redis pool");
            process::exit(1);
        }
    };
    if let Err(e) = redis.ping().await {
        error!(error = %e, redis_url = %config.redis_url, "Redis is unreachable");
        process::exit(1);
    }

    let storage = FsAdapter::new(config.storage_root.clone());
    let speech = match HttpTranscriber::new(&config.speech_url, config.speech_api_key.clone()) {
        Ok(speech) => speech,
        Err(e) => {
            error!(error = %e, "failed to build speech client");
            process::exit(1);
        }
    };
    let inference = match GeminiClient::new(&config.gemini_model) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to build inference client");
            process::exit(1);
        }
    };
    let keys = Arc::new(CredentialPool::from_env(pipeline.cooldown()));

    let queue: Arc<dyn JobQueuePort> = Arc::new(redis.clone());
    let repo: Arc<dyn TaskRepository> = Arc::new(redis);
    let tasks = TaskDispatcher::new(queue.clone(), repo);

    // 2. Workers
    let worker = Arc::new(WorkerService::new(
        storage.clone(),
        FfmpegAdapter::new(),
        speech,
        queue,
        tasks.clone(),
        pipeline.planner(),
        pipeline.scratch_root.clone(),
    ));
    for i in 0..pipeline.worker_count {
        let w = worker.clone();
        tokio::spawn(async move {
            w.run_worker_loop(i).await;
        });
    }
    info!(workers = pipeline.worker_count, "started pipeline workers");

    // 3. HTTP layer
    let state = AppState {
        tasks,
        storage: storage.clone(),
        query: Arc::new(QueryService::new(storage, inference, keys)),
        default_bucket: config.default_bucket.clone(),
    };
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = router(state).layer(cors).layer(TraceLayer::new_for_http());

    let address = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, address = %address, "failed to bind TCP listener");
            process::exit(1);
        }
    };
    info!(address = %address, storage_root = %config.storage_root.display(), "listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server stopped");
        process::exit(1);
    }
}
