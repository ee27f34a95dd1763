//! Webhook error reporter: POSTs one JSON `FailureReport` per failed action.

use async_trait::async_trait;
use hatchery_core::http::{HttpRequest, HttpTransport, Method};
use hatchery_core::report::{ErrorReporter, FailureReport};
use hatchery_core::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hatchery-signature";

/// Compute a signature header value for `body`.
///
/// Format: `sha256=<hex>`
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::InvalidInput(format!("webhook signing secret: {e}")))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

pub struct WebhookReporter {
    url: String,
    http: Arc<dyn HttpTransport>,
    signing_secret: Option<String>,
}

impl WebhookReporter {
    pub fn new(url: impl Into<String>, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            url: url.into(),
            http,
            signing_secret: None,
        }
    }

    pub fn with_signing_secret(mut self, secret: Option<String>) -> Self {
        self.signing_secret = secret.filter(|s| !s.is_empty());
        self
    }
}

#[async_trait]
impl ErrorReporter for WebhookReporter {
    #[tracing::instrument(level = "debug", skip_all, fields(action_id = %report.action_id))]
    async fn report(&self, report: &FailureReport) -> Result<()> {
        let body = serde_json::to_value(report).map_err(|e| Error::backend("encode report", e))?;
        let mut req = HttpRequest::new(Method::POST, &self.url).json(&body)?;
        if let Some(secret) = self.signing_secret.as_deref() {
            let signed = req.body.as_deref().unwrap_or_default();
            let sig = sign_body(secret, signed)?;
            req = req.header(SIGNATURE_HEADER, sig);
        }

        let context = format!("POST {}", self.url);
        let resp = self.http.send(req).await?;
        if !resp.is_success() {
            return Err(Error::upstream(context, resp.status, resp.body_snippet()));
        }
        Ok(())
    }
}
