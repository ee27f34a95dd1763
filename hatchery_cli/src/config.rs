//! Action file loading.
//!
//! Top-level shape (YAML or JSON):
//!
//! ```yaml
//! actions:
//!   - id: slack-audit
//!     type: slack
//!     bucket: security-logs
//!     settings: { access_token: "..." }
//! ```

use hatchery_core::models::Action;
use hatchery_core::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    /// `.json` is JSON; everything else parses as YAML, which also accepts
    /// JSON documents.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionsFile {
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl ActionsFile {
    #[tracing::instrument(level = "info")]
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidInput(format!("read action file {}: {e}", path.display()))
        })?;
        let file = Self::parse(&text, FileFormat::from_path(path)).map_err(|e| match e {
            Error::InvalidInput(msg) => Error::InvalidInput(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        tracing::info!(actions = file.actions.len(), "action file loaded");
        Ok(file)
    }

    pub fn parse(text: &str, format: FileFormat) -> Result<Self> {
        let file: ActionsFile = match format {
            FileFormat::Yaml => serde_yaml::from_str(text)
                .map_err(|e| Error::InvalidInput(format!("invalid yaml: {e}")))?,
            FileFormat::Json => serde_json::from_str(text)
                .map_err(|e| Error::InvalidInput(format!("invalid json: {e}")))?,
        };
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (idx, action) in self.actions.iter().enumerate() {
            if action.id.trim().is_empty() {
                return Err(Error::InvalidInput(format!("actions[{idx}]: id is empty")));
            }
            if !seen.insert(action.id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "actions[{idx}]: duplicate action id {:?}",
                    action.id
                )));
            }
            if action.kind.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "action {}: type is empty",
                    action.id
                )));
            }
            if action.bucket.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "action {}: bucket is empty",
                    action.id
                )));
            }
        }
        Ok(())
    }
}
