//! Connector capability types and the provider registry.
//!
//! Each provider contributes a `ConnectorProvider` that turns an `Action`
//! into a `Connector`. The connector is one of two shapes, each driven by a
//! generic harvester loop:
//!
//! - `Polling`: cursor-paginated HTTP pulls, one gzip object per page
//!   (`polling::run`).
//! - `QueueDrain`: receive notifications, copy the referenced objects,
//!   acknowledge (`queue_drain::run`).

pub mod polling;
pub mod queue_drain;

use crate::clock::Clock;
use crate::http::{HttpRequest, HttpTransport};
use crate::models::{Action, RequestId};
use crate::storage::{FileRef, MessageQueue, ObjectSink, ObjectSource, QueueMessage};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Collaborators injected into every connector run.
#[derive(Clone)]
pub struct HarvestContext {
    pub sink: Arc<dyn ObjectSink>,
    pub http: Arc<dyn HttpTransport>,
    pub clock: Arc<dyn Clock>,
    pub cancel: CancellationToken,
    pub request_id: RequestId,
}

impl HarvestContext {
    /// Race `fut` against cancellation of the run.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            res = fut => res,
        }
    }
}

/// Position of one page within a polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub now: DateTime<Utc>,
    /// `now - window`.
    pub start: DateTime<Utc>,
    pub seq: u64,
    pub cursor: Option<String>,
}

/// Provider half of a polling connector. The loop owns cursor, sequence and
/// persistence; the provider only speaks its wire format.
pub trait PollingSource: Send + Sync {
    fn window(&self) -> Duration;

    /// Upper bound on pages per run; `None` pulls until exhaustion.
    fn max_pages(&self) -> Option<u64> {
        None
    }

    fn build_request(&self, page: &PageRequest) -> Result<HttpRequest>;

    /// Next cursor when more pages exist.
    fn decode(&self, body: &[u8]) -> Result<Option<String>>;

    /// File name (without the `logs/...` directory) for this page.
    fn object_name(&self, page: &PageRequest) -> String;
}

/// Provider half of a queue-drain connector.
pub trait QueueDrainSource: Send + Sync {
    fn queue(&self) -> &dyn MessageQueue;

    fn objects(&self) -> &dyn ObjectSource;

    fn max_messages(&self) -> Option<u32> {
        None
    }

    /// Upper bound on receive calls per run; `None` drains until empty.
    fn max_pulls(&self) -> Option<u64> {
        None
    }

    /// Files referenced by one notification.
    fn decode(&self, msg: &QueueMessage) -> Result<Vec<FileRef>>;
}

pub enum Connector {
    Polling(Box<dyn PollingSource>),
    QueueDrain(Box<dyn QueueDrainSource>),
}

impl Connector {
    pub fn shape(&self) -> &'static str {
        match self {
            Connector::Polling(_) => "polling",
            Connector::QueueDrain(_) => "queue_drain",
        }
    }

    pub async fn exec(&self, ctx: &HarvestContext, action: &Action) -> Result<()> {
        match self {
            Connector::Polling(source) => polling::run(ctx, action, source.as_ref()).await,
            Connector::QueueDrain(source) => queue_drain::run(ctx, action, source.as_ref()).await,
        }
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Connector").field(&self.shape()).finish()
    }
}

/// Builds connectors for one action `type`.
#[async_trait]
pub trait ConnectorProvider: Send + Sync {
    /// Action `type` this provider handles (e.g. `slack`).
    fn kind(&self) -> &'static str;

    /// Parse and validate the action's settings and construct the connector.
    async fn build(&self, action: &Action) -> Result<Connector>;
}

/// Providers keyed by action type.
#[derive(Default)]
pub struct ConnectorRegistry {
    providers: RwLock<HashMap<String, Arc<dyn ConnectorProvider>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(level = "debug", skip(self, provider), fields(kind = provider.kind()))]
    pub async fn register(&self, provider: Arc<dyn ConnectorProvider>) -> Result<()> {
        let kind = provider.kind().to_string();
        if kind.trim().is_empty() {
            return Err(Error::InvalidInput("connector kind is empty".to_string()));
        }
        self.providers.write().await.insert(kind, provider);
        Ok(())
    }

    pub async fn get(&self, kind: &str) -> Option<Arc<dyn ConnectorProvider>> {
        self.providers.read().await.get(kind).cloned()
    }

    pub async fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.providers.read().await.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Build the connector for `action`, or `UnknownActionType`.
    pub async fn build(&self, action: &Action) -> Result<Connector> {
        let provider = self
            .get(&action.kind)
            .await
            .ok_or_else(|| Error::UnknownActionType {
                action_id: action.id.clone(),
                kind: action.kind.clone(),
            })?;
        provider.build(action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub;

    #[async_trait]
    impl ConnectorProvider for Stub {
        fn kind(&self) -> &'static str {
            "stub"
        }

        async fn build(&self, action: &Action) -> Result<Connector> {
            Err(Error::InvalidInput(format!("stub cannot build {}", action.id)))
        }
    }

    #[tokio::test]
    async fn unknown_kind_is_reported_with_action_id() {
        let registry = ConnectorRegistry::new();
        registry.register(Arc::new(Stub)).await.unwrap();
        assert_eq!(registry.kinds().await, vec!["stub".to_string()]);

        let err = registry
            .build(&Action::new("a9", "gopher", "b"))
            .await
            .unwrap_err();
        match err {
            Error::UnknownActionType { action_id, kind } => {
                assert_eq!(action_id, "a9");
                assert_eq!(kind, "gopher");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = registry.build(&Action::new("a1", "stub", "b")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
