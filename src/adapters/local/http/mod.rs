//! HTTP control surface for the local deployment.
//!
//! Thin JSON routes over the application services: uploads are picked up by
//! key, work is scheduled onto the queue, and callers poll task status.

mod error;
mod routes;

pub use error::{ApiError, ApiResult};

use crate::application::{QueryService, TaskDispatcher};
use crate::ports::inference::InferencePort;
use crate::ports::storage::StoragePort;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub struct AppState<S, I> {
    pub tasks: TaskDispatcher,
    pub storage: S,
    pub query: Arc<QueryService<S, I>>,
    /// Bucket used when a request does not name one.
    pub default_bucket: String,
}

impl<S: Clone, I> Clone for AppState<S, I> {
    fn clone(&self) -> Self {
        Self {
            tasks: self.tasks.clone(),
            storage: self.storage.clone(),
            query: self.query.clone(),
            default_bucket: self.default_bucket.clone(),
        }
    }
}

pub fn router<S, I>(state: AppState<S, I>) -> Router
where
    S: StoragePort + Clone + 'static,
    I: InferencePort + 'static,
{
    Router::new()
        .route("/health", get(routes::health::<S, I>))
        .route("/tasks", post(routes::start_task::<S, I>))
        .route("/tasks/:task_id", get(routes::get_task::<S, I>))
        .route("/render/selected", post(routes::render_selected::<S, I>))
        .route("/render/remaining", post(routes::render_remaining::<S, I>))
        .route("/query", post(routes::query::<S, I>))
        .route("/keys", get(routes::keys::<S, I>))
        .with_state(state)
}
