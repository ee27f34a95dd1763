//! CrowdStrike Falcon Data Replicator connector.
//!
//! FDR publishes one SQS notification per batch of files written to a
//! CrowdStrike-owned S3 bucket. Each referenced file is copied verbatim into
//! the sink under the action's time-bucketed prefix.

use crate::aws::{AwsClientFactory, AwsCredentials};
use async_trait::async_trait;
use hatchery_core::connector::{Connector, ConnectorProvider, QueueDrainSource};
use hatchery_core::models::Action;
use hatchery_core::storage::{FileRef, MessageQueue, ObjectSource, QueueMessage};
use hatchery_core::{Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

pub const KIND: &str = "falcon_data_replicator";

#[derive(Debug, Clone, Deserialize)]
pub struct FalconSettings {
    #[serde(flatten)]
    pub aws: AwsCredentials,
    pub sqs_url: String,
    #[serde(default)]
    pub max_messages: Option<u32>,
    #[serde(default)]
    pub max_pulls: Option<u64>,
}

impl FalconSettings {
    pub fn validate(&self) -> Result<()> {
        self.aws.validate()?;
        if self.sqs_url.trim().is_empty() {
            return Err(Error::InvalidInput("sqs_url is empty".to_string()));
        }
        if self.max_messages == Some(0) {
            return Err(Error::InvalidInput("max_messages must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Notification body published by FDR.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FdrMessage {
    pub bucket: String,
    #[serde(default)]
    pub cid: String,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub files: Vec<FdrFile>,
    #[serde(default)]
    pub path_prefix: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub total_size: u64,
}

#[derive(Debug, Deserialize)]
pub struct FdrFile {
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub checksum: String,
}

pub struct FalconSource {
    settings: FalconSettings,
    queue: Arc<dyn MessageQueue>,
    objects: Arc<dyn ObjectSource>,
}

impl FalconSource {
    pub fn new(
        settings: FalconSettings,
        queue: Arc<dyn MessageQueue>,
        objects: Arc<dyn ObjectSource>,
    ) -> Self {
        Self {
            settings,
            queue,
            objects,
        }
    }
}

impl QueueDrainSource for FalconSource {
    fn queue(&self) -> &dyn MessageQueue {
        self.queue.as_ref()
    }

    fn objects(&self) -> &dyn ObjectSource {
        self.objects.as_ref()
    }

    fn max_messages(&self) -> Option<u32> {
        self.settings.max_messages
    }

    fn max_pulls(&self) -> Option<u64> {
        self.settings.max_pulls
    }

    fn decode(&self, msg: &QueueMessage) -> Result<Vec<FileRef>> {
        let fdr: FdrMessage = serde_json::from_str(&msg.body)
            .map_err(|e| Error::InvalidInput(format!("fdr notification: {e}")))?;
        if fdr.bucket.trim().is_empty() {
            return Err(Error::InvalidInput("fdr notification has no bucket".to_string()));
        }
        tracing::debug!(
            cid = %fdr.cid,
            files = fdr.files.len(),
            total_size = fdr.total_size,
            "fdr notification"
        );
        Ok(fdr
            .files
            .into_iter()
            .map(|f| FileRef {
                bucket: fdr.bucket.clone(),
                path: f.path,
            })
            .collect())
    }
}

pub struct FalconProvider {
    clients: Arc<dyn AwsClientFactory>,
}

impl FalconProvider {
    pub fn new(clients: Arc<dyn AwsClientFactory>) -> Self {
        Self { clients }
    }
}

#[async_trait]
impl ConnectorProvider for FalconProvider {
    fn kind(&self) -> &'static str {
        KIND
    }

    #[instrument(level = "debug", skip(self, action), fields(action_id = %action.id))]
    async fn build(&self, action: &Action) -> Result<Connector> {
        let settings: FalconSettings = action.parse_settings()?;
        settings.validate()?;
        let queue = self.clients.queue(&settings.aws, &settings.sqs_url).await?;
        let objects = self.clients.objects(&settings.aws).await?;
        Ok(Connector::QueueDrain(Box::new(FalconSource::new(
            settings, queue, objects,
        ))))
    }
}
