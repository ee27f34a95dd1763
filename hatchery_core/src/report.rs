use crate::Result;
use crate::models::RequestId;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Payload forwarded to the error-reporting side channel for one failed
/// action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub request_id: RequestId,
    pub action_id: String,
    pub action_type: String,
    pub error: String,
    pub chain: Vec<String>,
}

/// Best-effort alerting sink. The executor logs and discards any error it
/// returns.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(&self, report: &FailureReport) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

#[async_trait]
impl ErrorReporter for NoopReporter {
    async fn report(&self, _report: &FailureReport) -> Result<()> {
        Ok(())
    }
}

/// Records reports in memory (primarily for tests).
#[derive(Clone, Default)]
pub struct MemoryReporter {
    reports: Arc<Mutex<Vec<FailureReport>>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reports(&self) -> Vec<FailureReport> {
        self.reports.lock().await.clone()
    }
}

#[async_trait]
impl ErrorReporter for MemoryReporter {
    async fn report(&self, report: &FailureReport) -> Result<()> {
        self.reports.lock().await.push(report.clone());
        Ok(())
    }
}
