use crate::domain::jobs::Job;
use crate::error::PortError;
use crate::ports::queue::JobQueuePort;
use async_trait::async_trait;
use aws_sdk_sqs::Client;
use tracing::warn;

/// SQS caps long polling at 20 seconds.
const MAX_WAIT_SECS: i32 = 20;

/// SqsAdapter implements JobQueuePort for AWS SQS.
#[derive(Clone)]
pub struct SqsAdapter {
    client: Client,
    queue_url: String,
}

impl SqsAdapter {
    pub fn new(client: Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

fn wait_time(timeout_secs: f64) -> i32 {
    if timeout_secs <= 0.0 {
        MAX_WAIT_SECS
    } else {
        (timeout_secs.ceil() as i32).min(MAX_WAIT_SECS)
    }
}

#[async_trait]
impl JobQueuePort for SqsAdapter {
    async fn enqueue_job(&self, job: Job) -> Result<(), PortError> {
        let message_body = serde_json::to_string(&job)?;
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(message_body)
            .send()
            .await?;
        Ok(())
    }

    async fn dequeue_job(&self, timeout_secs: f64) -> Result<Option<Job>, PortError> {
        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(wait_time(timeout_secs))
            .send()
            .await?;

        let Some(msg) = resp.messages.and_then(|m| m.into_iter().next()) else {
            return Ok(None);
        };

        // deleted even when the body does not decode
        if let Some(receipt_handle) = msg.receipt_handle() {
            self.client
                .delete_message()
                .queue_url(&self.queue_url)
                .receipt_handle(receipt_handle)
                .send()
                .await?;
        }

        match msg.body() {
            Some(body) => Ok(Some(serde_json::from_str(body)?)),
            None => {
                warn!(message_id = ?msg.message_id(), "dropping SQS message without body");
                Ok(None)
            }
        }
    }
}
