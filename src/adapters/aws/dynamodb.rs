use crate::domain::jobs::{TaskId, TaskKind, TaskState, VideoTask};
use crate::error::PortError;
use crate::ports::repository::TaskRepository;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;

/// DynamoAdapter implements TaskRepository for AWS DynamoDB.
#[derive(Clone)]
pub struct DynamoAdapter {
    client: Client,
    table_name: String,
}

impl DynamoAdapter {
    pub fn new(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

fn to_item(task: &VideoTask) -> Result<HashMap<String, AttributeValue>, PortError> {
    let mut item = HashMap::new();
    item.insert("task_id".to_string(), AttributeValue::S(task.id.to_string()));
    item.insert("kind".to_string(), AttributeValue::S(wire_name(&task.kind)?));
    item.insert("source_key".to_string(), AttributeValue::S(task.source_key.clone()));
    item.insert("bucket".to_string(), AttributeValue::S(task.bucket.clone()));
    item.insert("status".to_string(), AttributeValue::S(task.status.to_string()));
    item.insert(
        "status_detail".to_string(),
        AttributeValue::S(task.status_detail.clone()),
    );
    if let Some(duration) = task.duration_seconds {
        item.insert(
            "duration_seconds".to_string(),
            AttributeValue::N(duration.to_string()),
        );
    }
    if let Some(result) = &task.result {
        item.insert("result".to_string(), AttributeValue::S(result.to_string()));
    }
    Ok(item)
}

/// Serde name of a unit enum variant, e.g. `process_video`.
fn wire_name<T: serde::Serialize>(value: &T) -> Result<String, PortError> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(name) => Ok(name),
        other => Err(format!("expected a string, got {}", other).into()),
    }
}

fn from_wire_name<T: serde::de::DeserializeOwned>(name: &str) -> Result<T, PortError> {
    Ok(serde_json::from_value(serde_json::Value::String(name.to_string()))?)
}

fn string_attr<'a>(item: &'a HashMap<String, AttributeValue>, name: &str) -> Option<&'a str> {
    item.get(name).and_then(|v| v.as_s().ok()).map(String::as_str)
}

fn from_item(item: &HashMap<String, AttributeValue>) -> Result<VideoTask, PortError> {
    let id = string_attr(item, "task_id").ok_or("task item without task_id")?;
    let kind: TaskKind = from_wire_name(string_attr(item, "kind").ok_or("task item without kind")?)?;
    let status: TaskState = from_wire_name(string_attr(item, "status").unwrap_or("PENDING"))?;
    let result: Option<serde_json::Value> = string_attr(item, "result")
        .map(serde_json::from_str)
        .transpose()?;

    Ok(VideoTask {
        id: TaskId::from(id),
        kind,
        source_key: string_attr(item, "source_key").unwrap_or_default().to_string(),
        bucket: string_attr(item, "bucket").unwrap_or_default().to_string(),
        status,
        status_detail: string_attr(item, "status_detail")
            .unwrap_or_default()
            .to_string(),
        duration_seconds: item
            .get("duration_seconds")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse().ok()),
        result,
    })
}

#[async_trait]
impl TaskRepository for DynamoAdapter {
    async fn save_task(&self, task: &VideoTask) -> Result<(), PortError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_item(task)?))
            .send()
            .await?;
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<VideoTask>, PortError> {
        let resp = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("task_id", AttributeValue::S(id.to_string()))
            .consistent_read(true)
            .send()
            .await?;

        resp.item.as_ref().map(from_item).transpose()
    }
}
