use crate::domain::jobs::{TaskId, VideoTask};
use crate::error::PortError;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert or overwrite the task record
    async fn save_task(&self, task: &VideoTask) -> Result<(), PortError>;

    /// Get a task record by handle
    async fn get_task(&self, id: &TaskId) -> Result<Option<VideoTask>, PortError>;
}
