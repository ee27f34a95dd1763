use std::error::Error as StdError;
use std::fmt;

/// Common error type for `hatchery_core`.
///
/// Collaborator implementations (object stores, queues, HTTP clients) should
/// preserve the underlying error chain via `Error::backend` or
/// `Error::storage`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("upstream error: {context} ({}): {body}", status_text(.status))]
    Upstream {
        context: String,
        status: Option<u16>,
        body: String,
    },

    #[error("storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("unknown action type {kind:?} for action {action_id:?}")]
    UnknownActionType { action_id: String, kind: String },

    #[error("cancelled")]
    Cancelled,

    #[error("backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("{} action(s) failed: {}", .failures.len(), failed_ids(.failures))]
    ActionFailed { failures: Vec<ActionFailure> },
}

/// One action's failure inside an `Error::ActionFailed` aggregate.
#[derive(Debug)]
pub struct ActionFailure {
    pub action_id: String,
    pub error: Error,
}

fn status_text(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no response".to_string(),
    }
}

fn failed_ids(failures: &[ActionFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.action_id, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    #[tracing::instrument(level = "debug", name = "hatchery.error.backend", skip(source))]
    pub fn backend(
        context: impl Into<String> + std::fmt::Debug,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[tracing::instrument(level = "debug", name = "hatchery.error.storage", skip(source))]
    pub fn storage(
        context: impl Into<String> + std::fmt::Debug,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Non-2xx response from a provider, queue or object source.
    pub fn upstream(context: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            context: context.into(),
            status: Some(status),
            body: body.into(),
        }
    }

    /// Transport-level failure: no status was received.
    pub fn transport(context: impl Into<String>, source: impl fmt::Display) -> Self {
        Self::Upstream {
            context: context.into(),
            status: None,
            body: source.to_string(),
        }
    }

    /// Error messages from this error down through its `source` chain.
    pub fn chain(&self) -> Vec<String> {
        let mut out = vec![self.to_string()];
        let mut cur = StdError::source(self);
        while let Some(err) = cur {
            out.push(err.to_string());
            cur = err.source();
        }
        out
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_lists_every_failed_action() {
        let err = Error::ActionFailed {
            failures: vec![
                ActionFailure {
                    action_id: "a".into(),
                    error: Error::Cancelled,
                },
                ActionFailure {
                    action_id: "b".into(),
                    error: Error::InvalidInput("bad".into()),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "2 action(s) failed: a: cancelled, b: invalid input: bad"
        );
    }

    #[test]
    fn chain_follows_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = Error::storage("close logs/x", io);
        assert_eq!(err.chain(), vec!["storage error: close logs/x", "disk full"]);
    }
}
