//! 1Password Events API connector (`auditevents`).
//!
//! The first page posts the time window; every later page posts only the
//! cursor returned by the previous one.

use async_trait::async_trait;
use chrono::SecondsFormat;
use hatchery_core::connector::{Connector, ConnectorProvider, PageRequest, PollingSource};
use hatchery_core::http::{HttpRequest, Method};
use hatchery_core::models::Action;
use hatchery_core::naming::page_name;
use hatchery_core::{Error, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::instrument;

pub const KIND: &str = "one_password";
pub const DEFAULT_ENDPOINT: &str = "https://events.1password.com/api/v1/auditevents";

#[derive(Clone, Deserialize)]
pub struct OnePasswordSettings {
    pub api_token: String,
    #[serde(default = "super::paging::default_limit")]
    pub limit: u32,
    #[serde(default = "super::paging::default_duration", with = "humantime_serde")]
    pub duration: Duration,
    #[serde(default)]
    pub max_pages: Option<u64>,
    /// Regional endpoints (`events.ent.1password.com`, `events.1password.ca`, ...).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl std::fmt::Debug for OnePasswordSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnePasswordSettings")
            .field("limit", &self.limit)
            .field("duration", &self.duration)
            .field("max_pages", &self.max_pages)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OnePasswordSettings {
    pub fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(Error::InvalidInput("1password api_token is empty".to_string()));
        }
        super::paging::validate(self.limit, self.duration, self.max_pages)
    }
}

#[derive(Debug, Deserialize)]
struct AuditEventsResponse {
    #[serde(default)]
    cursor: String,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Clone)]
pub struct OnePasswordAuditSource {
    settings: OnePasswordSettings,
}

impl OnePasswordAuditSource {
    pub fn new(settings: OnePasswordSettings) -> Self {
        Self { settings }
    }
}

impl PollingSource for OnePasswordAuditSource {
    fn window(&self) -> Duration {
        self.settings.duration
    }

    fn max_pages(&self) -> Option<u64> {
        self.settings.max_pages
    }

    fn build_request(&self, page: &PageRequest) -> Result<HttpRequest> {
        let body = match page.cursor.as_deref().filter(|c| !c.is_empty()) {
            Some(cursor) => json!({ "cursor": cursor }),
            None => json!({
                "limit": self.settings.limit,
                "start_time": page.start.to_rfc3339_opts(SecondsFormat::Secs, false),
                "end_time": page.now.to_rfc3339_opts(SecondsFormat::Secs, false),
            }),
        };
        HttpRequest::new(Method::POST, &self.settings.endpoint)
            .bearer(&self.settings.api_token)
            .json(&body)
    }

    fn decode(&self, body: &[u8]) -> Result<Option<String>> {
        let resp: AuditEventsResponse = serde_json::from_slice(body)
            .map_err(|e| Error::InvalidInput(format!("1password audit events response: {e}")))?;
        tracing::debug!(has_more = resp.has_more, "decoded audit events page");
        if resp.has_more && !resp.cursor.is_empty() {
            Ok(Some(resp.cursor))
        } else {
            Ok(None)
        }
    }

    fn object_name(&self, page: &PageRequest) -> String {
        page_name(page.now, self.settings.duration, page.seq)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OnePasswordProvider;

#[async_trait]
impl ConnectorProvider for OnePasswordProvider {
    fn kind(&self) -> &'static str {
        KIND
    }

    #[instrument(level = "debug", skip(self, action), fields(action_id = %action.id))]
    async fn build(&self, action: &Action) -> Result<Connector> {
        let settings: OnePasswordSettings = action.parse_settings()?;
        settings.validate()?;
        Ok(Connector::Polling(Box::new(OnePasswordAuditSource::new(
            settings,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hatchery_core::clock::FixedClock;
    use hatchery_core::connector::HarvestContext;
    use hatchery_core::http::ScriptedTransport;
    use hatchery_core::models::RequestId;
    use hatchery_core::storage::memory::MemorySink;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn body_json(req: &HttpRequest) -> serde_json::Value {
        serde_json::from_slice(req.body.as_deref().unwrap_or_default()).unwrap()
    }

    #[tokio::test]
    async fn harvests_until_has_more_is_false() {
        let now = Utc.with_ymd_and_hms(2023, 3, 15, 16, 32, 50).unwrap();
        let http = ScriptedTransport::new();
        http.push_json(200, json!({"cursor": "c1", "has_more": true, "items": [{"uuid": "1"}]}))
            .await;
        http.push_json(200, json!({"cursor": "c2", "has_more": false, "items": []}))
            .await;
        let sink = MemorySink::new();
        let ctx = HarvestContext {
            sink: Arc::new(sink.clone()),
            http: Arc::new(http.clone()),
            clock: Arc::new(FixedClock(now)),
            cancel: CancellationToken::new(),
            request_id: RequestId::new(),
        };

        let action = Action::new("op", KIND, "bkt")
            .with_settings(json!({"api_token": "ops_x", "duration": "24h", "limit": 10}));
        let connector = OnePasswordProvider.build(&action).await.unwrap();
        connector.exec(&ctx, &action).await.unwrap();

        let reqs = http.requests().await;
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].method, Method::POST);
        assert_eq!(reqs[0].url, DEFAULT_ENDPOINT);
        assert_eq!(reqs[0].header_value("authorization"), Some("Bearer ops_x"));
        assert_eq!(
            body_json(&reqs[0]),
            json!({
                "limit": 10,
                "start_time": "2023-03-14T16:32:50+00:00",
                "end_time": "2023-03-15T16:32:50+00:00",
            })
        );
        assert_eq!(body_json(&reqs[1]), json!({"cursor": "c1"}));

        let keys: Vec<_> = sink.objects().await.into_keys().map(|(_, k)| k).collect();
        assert_eq!(
            keys,
            vec![
                "logs/2023/03/15/16/20230315T163250_86400_0.json.gz",
                "logs/2023/03/15/16/20230315T163250_86400_1.json.gz",
            ]
        );
    }

    #[test]
    fn has_more_without_cursor_stops() {
        let settings: OnePasswordSettings = Action::new("op", KIND, "b")
            .with_settings(json!({"api_token": "t"}))
            .parse_settings()
            .unwrap();
        let src = OnePasswordAuditSource::new(settings);
        assert_eq!(src.decode(br#"{"cursor":"","has_more":true}"#).unwrap(), None);
        assert_eq!(
            src.decode(br#"{"cursor":"n","has_more":true}"#).unwrap(),
            Some("n".to_string())
        );
    }
}
