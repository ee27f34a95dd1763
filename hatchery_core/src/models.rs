use crate::naming::Partition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One configured ingestion job: which provider to pull from and where to
/// write the objects. Loaded once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub bucket: String,
    /// Custom key prefix prepended before `logs/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<Partition>,
    /// Provider-specific settings. May hold credentials; never logged.
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl Action {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            tags: BTreeSet::new(),
            bucket: bucket.into(),
            prefix: None,
            partition: None,
            settings: serde_json::Value::Null,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }

    /// Parse `settings` into a provider's typed settings struct.
    pub fn parse_settings<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        let value = match &self.settings {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            v => v.clone(),
        };
        serde_json::from_value(value).map_err(|e| {
            crate::Error::InvalidInput(format!(
                "action {}: invalid {} settings: {e}",
                self.id, self.kind
            ))
        })
    }
}

/// Correlates every log line of one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub uuid::Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        token: String,
        #[serde(default)]
        limit: Option<u32>,
    }

    #[test]
    fn action_reads_type_field_and_defaults() {
        let action: Action = serde_json::from_value(serde_json::json!({
            "id": "slack-audit",
            "type": "slack",
            "bucket": "audit-logs",
        }))
        .unwrap();
        assert_eq!(action.kind, "slack");
        assert!(action.tags.is_empty());
        assert!(action.prefix.is_none());
        assert!(action.partition.is_none());
    }

    #[test]
    fn parse_settings_reports_action_id() {
        let action = Action::new("a1", "slack", "b").with_settings(serde_json::json!({"limit": 5}));
        let err = action.parse_settings::<Sample>().unwrap_err();
        assert!(err.to_string().contains("action a1"), "{err}");

        let ok = Action::new("a2", "slack", "b")
            .with_settings(serde_json::json!({"token": "xoxp"}))
            .parse_settings::<Sample>()
            .unwrap();
        assert_eq!(ok.token, "xoxp");
        assert_eq!(ok.limit, None);
    }
}
