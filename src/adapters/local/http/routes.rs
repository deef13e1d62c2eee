use super::error::ApiResult;
use super::AppState;
use crate::application::QueryOutcome;
use crate::domain::clips::Clip;
use crate::domain::credentials::KeySnapshot;
use crate::domain::jobs::{
    Job, RenderRemainingJob, RenderSelectedJob, TaskId, TaskKind, TaskState,
};
use crate::ports::inference::InferencePort;
use crate::ports::storage::StoragePort;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Deserialize)]
pub struct StartTaskRequest {
    pub bucket: Option<String>,
    pub object_key: String,
}

#[derive(Deserialize)]
pub struct RenderSelectedRequest {
    pub bucket: Option<String>,
    pub source_key: String,
    pub clips: Vec<Clip>,
}

#[derive(Deserialize)]
pub struct RenderRemainingRequest {
    pub bucket: Option<String>,
    pub source_key: String,
    #[serde(default)]
    pub selected: Vec<Clip>,
}

#[derive(Deserialize)]
pub struct QueryRequest {
    pub bucket: Option<String>,
    pub transcript_key: String,
    pub question: String,
}

#[derive(Serialize, Deserialize)]
pub struct TaskAccepted {
    pub task_id: TaskId,
}

#[derive(Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub state: TaskState,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<S, I> AppState<S, I> {
    fn bucket(&self, requested: Option<String>) -> String {
        requested.unwrap_or_else(|| self.default_bucket.clone())
    }
}

async fn accept<S, I>(state: &AppState<S, I>, job: Job) -> ApiResult<(StatusCode, Json<TaskAccepted>)> {
    let task_id = state.tasks.schedule(job).await?;
    Ok((StatusCode::ACCEPTED, Json(TaskAccepted { task_id })))
}

/// Readiness of the default bucket.
pub async fn health<S, I>(State(state): State<AppState<S, I>>) -> impl IntoResponse
where
    S: StoragePort + Clone + 'static,
    I: InferencePort + 'static,
{
    let version = env!("CARGO_PKG_VERSION");
    match state.storage.check(&state.default_bucket).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                version,
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unavailable",
                version,
                error: Some(e.to_string()),
            }),
        ),
    }
}

pub async fn start_task<S, I>(
    State(state): State<AppState<S, I>>,
    Json(request): Json<StartTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskAccepted>)>
where
    S: StoragePort + Clone + 'static,
    I: InferencePort + 'static,
{
    let bucket = state.bucket(request.bucket);
    info!(bucket = %bucket, object_key = %request.object_key, "processing requested");
    accept(&state, Job::process_video(bucket, request.object_key)).await
}

pub async fn get_task<S, I>(
    State(state): State<AppState<S, I>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskResponse>>
where
    S: StoragePort + Clone + 'static,
    I: InferencePort + 'static,
{
    let task = state.tasks.task(&TaskId::from(task_id.as_str())).await?;
    Ok(Json(TaskResponse {
        task_id: task.id,
        kind: task.kind,
        state: task.status,
        detail: task.status_detail,
        duration_seconds: task.duration_seconds,
        result: task.result,
    }))
}

pub async fn render_selected<S, I>(
    State(state): State<AppState<S, I>>,
    Json(request): Json<RenderSelectedRequest>,
) -> ApiResult<(StatusCode, Json<TaskAccepted>)>
where
    S: StoragePort + Clone + 'static,
    I: InferencePort + 'static,
{
    let job = Job::RenderSelected(RenderSelectedJob {
        id: TaskId::new(),
        bucket: state.bucket(request.bucket),
        source_key: request.source_key,
        clips: request.clips,
    });
    accept(&state, job).await
}

pub async fn render_remaining<S, I>(
    State(state): State<AppState<S, I>>,
    Json(request): Json<RenderRemainingRequest>,
) -> ApiResult<(StatusCode, Json<TaskAccepted>)>
where
    S: StoragePort + Clone + 'static,
    I: InferencePort + 'static,
{
    let job = Job::RenderRemaining(RenderRemainingJob {
        id: TaskId::new(),
        bucket: state.bucket(request.bucket),
        source_key: request.source_key,
        selected: request.selected,
    });
    accept(&state, job).await
}

pub async fn query<S, I>(
    State(state): State<AppState<S, I>>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<(StatusCode, Json<QueryOutcome>)>
where
    S: StoragePort + Clone + 'static,
    I: InferencePort + 'static,
{
    let bucket = state.bucket(request.bucket);
    let outcome = state
        .query
        .query(&bucket, &request.transcript_key, &request.question)
        .await?;
    let status = match outcome {
        QueryOutcome::Answered { .. } => StatusCode::OK,
        QueryOutcome::NoKeyAvailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    Ok((status, Json(outcome)))
}

/// Masked state of every inference key.
pub async fn keys<S, I>(State(state): State<AppState<S, I>>) -> Json<BTreeMap<String, KeySnapshot>>
where
    S: StoragePort + Clone + 'static,
    I: InferencePort + 'static,
{
    Json(state.query.keys().snapshot())
}
