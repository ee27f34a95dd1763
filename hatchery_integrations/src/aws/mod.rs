//! AWS collaborators for queue-drain connectors: SQS notifications and S3
//! object reads. Credentials are static per action.

pub mod s3;
pub mod sqs;

use async_trait::async_trait;
use hatchery_core::storage::{MessageQueue, ObjectSource};
use hatchery_core::{Error, Result};
use serde::Deserialize;
use std::sync::Arc;

/// Static credentials and region for one action.
#[derive(Clone, Deserialize)]
pub struct AwsCredentials {
    #[serde(rename = "aws_region")]
    pub region: String,
    #[serde(rename = "aws_access_key_id")]
    pub access_key_id: String,
    #[serde(rename = "aws_secret_access_key")]
    pub secret_access_key: String,
    /// Endpoint override (LocalStack, VPC endpoints).
    #[serde(default, rename = "aws_endpoint")]
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl AwsCredentials {
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(Error::InvalidInput("aws_region is empty".to_string()));
        }
        if self.access_key_id.trim().is_empty() || self.secret_access_key.trim().is_empty() {
            return Err(Error::InvalidInput("aws credentials are empty".to_string()));
        }
        Ok(())
    }
}

/// Builds the AWS-backed collaborators for an action. Swapped for in-memory
/// doubles in tests.
#[async_trait]
pub trait AwsClientFactory: Send + Sync {
    async fn queue(&self, creds: &AwsCredentials, queue_url: &str)
    -> Result<Arc<dyn MessageQueue>>;

    async fn objects(&self, creds: &AwsCredentials) -> Result<Arc<dyn ObjectSource>>;
}

#[cfg(feature = "aws")]
pub use real::SdkClientFactory;

#[cfg(feature = "aws")]
pub mod real {
    use super::{AwsClientFactory, AwsCredentials};
    use crate::aws::s3::S3ObjectSource;
    use crate::aws::sqs::SqsQueue;
    use crate::aws::sqs::real::AwsSqsApi;
    use async_trait::async_trait;
    use aws_config::{BehaviorVersion, SdkConfig};
    use aws_credential_types::Credentials;
    use aws_sdk_s3::config::Region;
    use hatchery_core::Result;
    use hatchery_core::storage::{MessageQueue, ObjectSource};
    use std::sync::Arc;

    /// Real AWS SDK clients built from static per-action credentials.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SdkClientFactory;

    #[tracing::instrument(level = "debug", skip(creds), fields(region = %creds.region))]
    async fn shared_config(creds: &AwsCredentials) -> SdkConfig {
        let credentials = Credentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            None,
            None,
            "hatchery_static",
        );
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(creds.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &creds.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        loader.load().await
    }

    #[async_trait]
    impl AwsClientFactory for SdkClientFactory {
        async fn queue(
            &self,
            creds: &AwsCredentials,
            queue_url: &str,
        ) -> Result<Arc<dyn MessageQueue>> {
            let shared = shared_config(creds).await;
            let client = aws_sdk_sqs::Client::new(&shared);
            Ok(Arc::new(SqsQueue::new(AwsSqsApi::new(client), queue_url)))
        }

        async fn objects(&self, creds: &AwsCredentials) -> Result<Arc<dyn ObjectSource>> {
            let shared = shared_config(creds).await;
            let s3_cfg = aws_sdk_s3::config::Builder::from(&shared)
                .force_path_style(creds.endpoint.is_some())
                .build();
            Ok(Arc::new(S3ObjectSource::new(aws_sdk_s3::Client::from_conf(
                s3_cfg,
            ))))
        }
    }
}
