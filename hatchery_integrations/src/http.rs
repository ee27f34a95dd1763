//! reqwest-backed `HttpTransport`.

use async_trait::async_trait;
use hatchery_core::http::{HttpRequest, HttpResponse, HttpTransport};
use hatchery_core::{Error, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::instrument;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hatchery/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::backend("build http client", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(level = "debug", skip(self, req), fields(method = %req.method, url = %req.url))]
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        let context = format!("{} {}", req.method, req.url);
        let mut builder = self.client.request(req.method, &req.url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        for (k, v) in &req.headers {
            builder = builder.header(k, v);
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| Error::transport(context.clone(), e))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::transport(context, e))?;
        tracing::debug!(status, bytes = body.len(), "response received");
        Ok(HttpResponse { status, body })
    }
}
