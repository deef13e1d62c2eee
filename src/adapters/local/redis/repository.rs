//! Redis TaskRepository implementation.

use super::error::QueueError;
use super::pool::RedisPool;
use super::{TASK_PREFIX, TASK_TTL_SECS};
use crate::domain::jobs::{TaskId, VideoTask};
use crate::error::PortError;
use crate::ports::repository::TaskRepository;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;

fn task_key(id: &TaskId) -> String {
    format!("{}{}", TASK_PREFIX, id)
}

#[async_trait]
impl TaskRepository for RedisPool {
    async fn save_task(&self, task: &VideoTask) -> Result<(), PortError> {
        let mut conn = self.pool.get().await.map_err(QueueError::from)?;
        let json = serde_json::to_string(task)?;
        conn.set_ex::<_, _, ()>(task_key(&task.id), json, TASK_TTL_SECS)
            .await
            .map_err(QueueError::from)?;
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<VideoTask>, PortError> {
        let mut conn = self.pool.get().await.map_err(QueueError::from)?;
        let json: Option<String> = conn.get(task_key(id)).await.map_err(QueueError::from)?;
        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }
}
