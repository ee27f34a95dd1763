//! Minimal HTTP seam for polling connectors. Providers build an
//! `HttpRequest`; the transport (reqwest in production, scripted in tests)
//! executes it.

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use reqwest::Method;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn json(self, body: &serde_json::Value) -> Result<Self> {
        let bytes = serde_json::to_vec(body).map_err(|e| Error::backend("encode request body", e))?;
        let mut req = self.header("Content-Type", "application/json");
        req.body = Some(Bytes::from(bytes));
        Ok(req)
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, truncated for error messages.
    pub fn body_snippet(&self) -> String {
        const MAX: usize = 512;
        let text = String::from_utf8_lossy(&self.body);
        match text.char_indices().nth(MAX) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.into_owned(),
        }
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute one request. Only transport failures are errors; the caller
    /// decides what a non-2xx status means.
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse>;
}

/// Transport that replays queued responses and records every request.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Result<HttpResponse>>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_json(&self, status: u16, body: serde_json::Value) {
        self.responses.lock().await.push_back(Ok(HttpResponse {
            status,
            body: Bytes::from(body.to_string()),
        }));
    }

    pub async fn push_error(&self, err: Error) {
        self.responses.lock().await.push_back(Err(err));
    }

    pub async fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        let url = req.url.clone();
        self.requests.lock().await.push(req);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(Error::transport(url, "no scripted response left")))
    }
}
