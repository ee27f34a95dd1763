//! SQS-backed `MessageQueue`.

use async_trait::async_trait;
use hatchery_core::Result;
use hatchery_core::storage::{MessageQueue, QueueMessage};
use tracing::instrument;

/// SQS hard limit for one ReceiveMessage call.
pub const MAX_RECEIVE: u32 = 10;

#[async_trait]
pub trait SqsApi: Send + Sync {
    /// `(body, receipt_handle)` pairs.
    async fn receive_messages(&self, queue_url: &str, max: i32) -> Result<Vec<(String, String)>>;
    async fn delete_message(&self, queue_url: &str, receipt: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct SqsQueue<C: SqsApi> {
    client: C,
    queue_url: String,
}

impl<C: SqsApi> SqsQueue<C> {
    pub fn new(client: C, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl<C: SqsApi> MessageQueue for SqsQueue<C> {
    #[instrument(level = "debug", skip(self), fields(queue_url = %self.queue_url))]
    async fn receive(&self, max: Option<u32>) -> Result<Vec<QueueMessage>> {
        let max = max.unwrap_or(MAX_RECEIVE).clamp(1, MAX_RECEIVE) as i32;
        let messages = self.client.receive_messages(&self.queue_url, max).await?;
        Ok(messages
            .into_iter()
            .map(|(body, receipt_handle)| QueueMessage {
                body,
                receipt_handle,
            })
            .collect())
    }

    #[instrument(level = "debug", skip(self, receipt_handle))]
    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message(&self.queue_url, receipt_handle)
            .await
    }
}

/// Real SQS client adapter (only compiled when the `aws` feature is enabled).
#[cfg(feature = "aws")]
pub mod real {
    use super::SqsApi;
    use aws_sdk_sqs::Client as SqsClient;
    use aws_sdk_sqs::error::DisplayErrorContext;
    use hatchery_core::{Error, Result};
    use tracing::instrument;

    #[derive(Clone)]
    pub struct AwsSqsApi {
        inner: SqsClient,
    }

    impl AwsSqsApi {
        pub fn new(inner: SqsClient) -> Self {
            Self { inner }
        }
    }

    #[async_trait::async_trait]
    impl SqsApi for AwsSqsApi {
        #[instrument(level = "debug", skip(self))]
        async fn receive_messages(
            &self,
            queue_url: &str,
            max: i32,
        ) -> Result<Vec<(String, String)>> {
            let resp = self
                .inner
                .receive_message()
                .queue_url(queue_url)
                .max_number_of_messages(max)
                .send()
                .await
                .map_err(|e| Error::transport(format!("sqs receive {queue_url}"), DisplayErrorContext(e)))?;
            let mut out = Vec::new();
            for m in resp.messages.unwrap_or_default() {
                if let (Some(body), Some(receipt)) = (m.body, m.receipt_handle) {
                    out.push((body, receipt));
                }
            }
            Ok(out)
        }

        #[instrument(level = "debug", skip(self, receipt))]
        async fn delete_message(&self, queue_url: &str, receipt: &str) -> Result<()> {
            self.inner
                .delete_message()
                .queue_url(queue_url)
                .receipt_handle(receipt)
                .send()
                .await
                .map_err(|e| Error::transport(format!("sqs delete {queue_url}"), DisplayErrorContext(e)))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSqs {
        received: Mutex<Vec<(String, i32)>>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SqsApi for FakeSqs {
        async fn receive_messages(
            &self,
            queue_url: &str,
            max: i32,
        ) -> Result<Vec<(String, String)>> {
            self.received
                .lock()
                .unwrap()
                .push((queue_url.to_string(), max));
            Ok(vec![("{}".to_string(), "rh-1".to_string())])
        }

        async fn delete_message(&self, _queue_url: &str, receipt: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(receipt.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn receive_clamps_batch_size_to_sqs_limit() {
        let q = SqsQueue::new(FakeSqs::default(), "https://sqs.test/q");
        let msgs = q.receive(Some(50)).await.unwrap();
        assert_eq!(msgs[0].receipt_handle, "rh-1");
        q.receive(None).await.unwrap();
        q.receive(Some(3)).await.unwrap();
        q.delete("rh-1").await.unwrap();

        let received = q.client.received.lock().unwrap().clone();
        let sizes: Vec<_> = received.iter().map(|(_, m)| *m).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert_eq!(q.client.deleted.lock().unwrap().as_slice(), ["rh-1".to_string()]);
    }
}
