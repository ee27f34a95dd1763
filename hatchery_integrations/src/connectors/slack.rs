//! Slack audit-log connector (Enterprise Grid audit API).
//!
//! Pages backwards from `now - duration` with `oldest` and follows
//! `response_metadata.next_cursor` until Slack stops returning one.

use async_trait::async_trait;
use hatchery_core::connector::{Connector, ConnectorProvider, PageRequest, PollingSource};
use hatchery_core::http::{HttpRequest, Method};
use hatchery_core::models::Action;
use hatchery_core::naming::padded_page_name;
use hatchery_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

pub const KIND: &str = "slack";
pub const DEFAULT_BASE_URL: &str = "https://api.slack.com/audit/v1/logs";

#[derive(Clone, Deserialize)]
pub struct SlackSettings {
    pub access_token: String,
    #[serde(default = "super::paging::default_limit")]
    pub limit: u32,
    #[serde(default = "super::paging::default_duration", with = "humantime_serde")]
    pub duration: Duration,
    #[serde(default)]
    pub max_pages: Option<u64>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl std::fmt::Debug for SlackSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackSettings")
            .field("limit", &self.limit)
            .field("duration", &self.duration)
            .field("max_pages", &self.max_pages)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SlackSettings {
    pub fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            return Err(Error::InvalidInput("slack access_token is empty".to_string()));
        }
        super::paging::validate(self.limit, self.duration, self.max_pages)
    }
}

#[derive(Debug, Deserialize)]
struct AuditLogsResponse {
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Clone)]
pub struct SlackAuditSource {
    settings: SlackSettings,
}

impl SlackAuditSource {
    pub fn new(settings: SlackSettings) -> Self {
        Self { settings }
    }
}

impl PollingSource for SlackAuditSource {
    fn window(&self) -> Duration {
        self.settings.duration
    }

    fn max_pages(&self) -> Option<u64> {
        self.settings.max_pages
    }

    fn build_request(&self, page: &PageRequest) -> Result<HttpRequest> {
        let mut req = HttpRequest::new(Method::GET, &self.settings.base_url)
            .query("limit", self.settings.limit.to_string())
            .query("oldest", page.start.timestamp().to_string())
            .header("Content-Type", "application/json")
            .bearer(&self.settings.access_token);
        if let Some(cursor) = page.cursor.as_deref().filter(|c| !c.is_empty()) {
            req = req.query("cursor", cursor);
        }
        Ok(req)
    }

    fn decode(&self, body: &[u8]) -> Result<Option<String>> {
        let resp: AuditLogsResponse = serde_json::from_slice(body)
            .map_err(|e| Error::InvalidInput(format!("slack audit logs response: {e}")))?;
        Ok(resp
            .response_metadata
            .map(|m| m.next_cursor)
            .filter(|c| !c.is_empty()))
    }

    fn object_name(&self, page: &PageRequest) -> String {
        padded_page_name(page.now, self.settings.duration, page.seq)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SlackProvider;

#[async_trait]
impl ConnectorProvider for SlackProvider {
    fn kind(&self) -> &'static str {
        KIND
    }

    #[instrument(level = "debug", skip(self, action), fields(action_id = %action.id))]
    async fn build(&self, action: &Action) -> Result<Connector> {
        let settings: SlackSettings = action.parse_settings()?;
        settings.validate()?;
        Ok(Connector::Polling(Box::new(SlackAuditSource::new(settings))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn source(settings: serde_json::Value) -> SlackAuditSource {
        let action = Action::new("slack-1", KIND, "bkt").with_settings(settings);
        let settings: SlackSettings = action.parse_settings().unwrap();
        settings.validate().unwrap();
        SlackAuditSource::new(settings)
    }

    fn page(seq: u64, cursor: Option<&str>) -> PageRequest {
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        PageRequest {
            now,
            start: now - chrono::Duration::minutes(10),
            seq,
            cursor: cursor.map(str::to_string),
        }
    }

    #[test]
    fn defaults_apply() {
        let src = source(json!({"access_token": "xoxp-1"}));
        assert_eq!(src.settings.limit, 100);
        assert_eq!(src.settings.duration, Duration::from_secs(600));
        assert_eq!(src.settings.max_pages, None);
        assert_eq!(src.settings.base_url, DEFAULT_BASE_URL);
        assert!(!format!("{:?}", src.settings).contains("xoxp-1"));
    }

    #[test]
    fn request_carries_window_and_cursor() {
        let src = source(json!({"access_token": "xoxp-1", "limit": 50, "duration": "1h"}));

        let first = src.build_request(&page(0, None)).unwrap();
        assert_eq!(first.method, Method::GET);
        assert_eq!(first.url, DEFAULT_BASE_URL);
        assert_eq!(first.query_value("limit"), Some("50"));
        assert_eq!(first.query_value("oldest"), Some("1714978689"));
        assert_eq!(first.query_value("cursor"), None);
        assert_eq!(first.header_value("authorization"), Some("Bearer xoxp-1"));

        let next = src.build_request(&page(1, Some("dXNlcjpVMEc5V0ZYTlo="))).unwrap();
        assert_eq!(next.query_value("cursor"), Some("dXNlcjpVMEc5V0ZYTlo="));
    }

    #[test]
    fn decode_follows_next_cursor() {
        let src = source(json!({"access_token": "t"}));
        let more = json!({"entries": [], "response_metadata": {"next_cursor": "abc"}});
        assert_eq!(
            src.decode(more.to_string().as_bytes()).unwrap(),
            Some("abc".to_string())
        );
        let done = json!({"entries": [], "response_metadata": {"next_cursor": ""}});
        assert_eq!(src.decode(done.to_string().as_bytes()).unwrap(), None);
        assert_eq!(src.decode(b"{}").unwrap(), None);
        assert!(src.decode(b"<html>").is_err());
    }

    #[test]
    fn object_name_is_zero_padded() {
        let src = source(json!({"access_token": "t"}));
        assert_eq!(
            src.object_name(&page(3, None)),
            "20240506T070809_600_00000003.json.gz"
        );
    }

    #[tokio::test]
    async fn provider_rejects_missing_token() {
        let action = Action::new("s", KIND, "bkt").with_settings(json!({"access_token": " "}));
        assert!(matches!(
            SlackProvider.build(&action).await,
            Err(Error::InvalidInput(_))
        ));
        let action = Action::new("s", KIND, "bkt");
        assert!(SlackProvider.build(&action).await.is_err());
    }
}
