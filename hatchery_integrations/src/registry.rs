use hatchery_core::Result;
use hatchery_core::connector::ConnectorRegistry;
#[allow(unused_imports)]
use std::sync::Arc;

/// Registry with every provider compiled into this build.
#[tracing::instrument(level = "debug")]
pub async fn default_registry() -> Result<ConnectorRegistry> {
    let registry = ConnectorRegistry::new();
    #[cfg(feature = "slack")]
    registry
        .register(Arc::new(crate::connectors::slack::SlackProvider))
        .await?;
    #[cfg(feature = "one_password")]
    registry
        .register(Arc::new(crate::connectors::one_password::OnePasswordProvider))
        .await?;
    #[cfg(feature = "falcon")]
    registry
        .register(Arc::new(crate::connectors::falcon::FalconProvider::new(
            Arc::new(crate::aws::SdkClientFactory),
        )))
        .await?;
    Ok(registry)
}

#[cfg(all(test, feature = "slack", feature = "one_password", feature = "falcon"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn all_providers_registered() {
        let registry = default_registry().await.unwrap();
        assert_eq!(
            registry.kinds().await,
            vec!["falcon_data_replicator", "one_password", "slack"]
        );
    }
}
