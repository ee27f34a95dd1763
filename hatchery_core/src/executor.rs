//! Concurrent action executor.
//!
//! One tokio task per selected action. Failures are isolated per action,
//! forwarded individually to the error reporter, and aggregated into a
//! single `Error::ActionFailed` once every task has finished.

use crate::clock::{Clock, SystemClock};
use crate::connector::{ConnectorRegistry, HarvestContext};
use crate::error::ActionFailure;
use crate::http::HttpTransport;
use crate::models::{Action, RequestId};
use crate::report::{ErrorReporter, FailureReport, NoopReporter};
use crate::selector::Selector;
use crate::storage::ObjectSink;
use crate::{Error, Result};
use futures_util::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Log the plan and return without touching any collaborator.
    pub dry_run: bool,
    /// Ceiling on simultaneously running actions; `None` is unbounded.
    pub max_concurrency: Option<usize>,
}

pub struct Executor {
    registry: Arc<ConnectorRegistry>,
    sink: Arc<dyn ObjectSink>,
    http: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    reporter: Arc<dyn ErrorReporter>,
    options: ExecuteOptions,
}

impl Executor {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(
        registry: Arc<ConnectorRegistry>,
        sink: Arc<dyn ObjectSink>,
        http: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            registry,
            sink,
            http,
            clock: Arc::new(SystemClock),
            reporter: Arc::new(NoopReporter),
            options: ExecuteOptions::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn execute(&self, actions: &[Action], selector: &Selector) -> Result<()> {
        self.execute_with_cancel(actions, selector, CancellationToken::new())
            .await
    }

    /// Run every action the selector picks. Waits for all of them even when
    /// some fail; dropping the returned future aborts the running tasks.
    pub async fn execute_with_cancel(
        &self,
        actions: &[Action],
        selector: &Selector,
        cancel: CancellationToken,
    ) -> Result<()> {
        selector.validate()?;

        let request_id = RequestId::new();
        let span = tracing::info_span!("hatchery.execute", request_id = %request_id);
        self.run_selected(actions, selector, cancel, request_id)
            .instrument(span)
            .await
    }

    async fn run_selected(
        &self,
        actions: &[Action],
        selector: &Selector,
        cancel: CancellationToken,
        request_id: RequestId,
    ) -> Result<()> {
        let selected = selector.filter(actions);
        for action in &selected {
            tracing::info!(
                action_id = %action.id,
                action_type = %action.kind,
                tags = ?action.tags,
                bucket = %action.bucket,
                prefix = ?action.prefix,
                "selected action"
            );
        }
        tracing::info!(
            selected = selected.len(),
            configured = actions.len(),
            dry_run = self.options.dry_run,
            "execution plan"
        );
        if self.options.dry_run || selected.is_empty() {
            return Ok(());
        }

        let ctx = HarvestContext {
            sink: self.sink.clone(),
            http: self.http.clone(),
            clock: self.clock.clone(),
            cancel,
            request_id,
        };
        let semaphore = self
            .options
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        let (tx, mut rx) = mpsc::channel::<(usize, ActionFailure)>(selected.len());

        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::new();
        for (index, action) in selected.into_iter().enumerate() {
            let task = ActionTask {
                index,
                action: action.clone(),
                ctx: ctx.clone(),
                registry: self.registry.clone(),
                reporter: self.reporter.clone(),
                semaphore: semaphore.clone(),
                failures: tx.clone(),
            };
            let span = tracing::info_span!("hatchery.action", action_id = %action.id);
            let handle = tasks.spawn(task.run().instrument(span));
            spawned.insert(handle.id(), (index, action.id.clone()));
        }
        drop(tx);

        // A task that never reached its own failure send still counts.
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            let Err(e) = joined else { continue };
            let Some((index, action_id)) = spawned.remove(&e.id()) else {
                continue;
            };
            tracing::error!(action_id = %action_id, error = %e, "action task aborted");
            failures.push((
                index,
                ActionFailure {
                    action_id,
                    error: Error::backend("action task aborted", e),
                },
            ));
        }
        while let Some(failure) = rx.recv().await {
            failures.push(failure);
        }
        if failures.is_empty() {
            tracing::info!("all actions succeeded");
            return Ok(());
        }
        failures.sort_by_key(|(index, _)| *index);
        tracing::error!(failed = failures.len(), "execution finished with failures");
        Err(Error::ActionFailed {
            failures: failures.into_iter().map(|(_, f)| f).collect(),
        })
    }
}

struct ActionTask {
    index: usize,
    action: Action,
    ctx: HarvestContext,
    registry: Arc<ConnectorRegistry>,
    reporter: Arc<dyn ErrorReporter>,
    semaphore: Option<Arc<Semaphore>>,
    failures: mpsc::Sender<(usize, ActionFailure)>,
}

impl ActionTask {
    async fn run(self) {
        let outcome = AssertUnwindSafe(self.harvest()).catch_unwind().await;
        let err = match outcome {
            Ok(Ok(())) => {
                tracing::info!("action succeeded");
                return;
            }
            Ok(Err(e)) => e,
            Err(panic) => Error::backend(
                format!("action {} panicked", self.action.id),
                std::io::Error::other(panic_message(panic.as_ref())),
            ),
        };
        tracing::error!(error = %err, "action failed");

        if !matches!(err, Error::Cancelled) {
            self.report(&err).await;
        }
        let failure = ActionFailure {
            action_id: self.action.id.clone(),
            error: err,
        };
        if self.failures.send((self.index, failure)).await.is_err() {
            tracing::warn!("executor stopped collecting failures");
        }
    }

    async fn harvest(&self) -> Result<()> {
        let _permit = self.acquire().await?;
        let connector = self.registry.build(&self.action).await?;
        tracing::debug!(shape = connector.shape(), "connector built");
        connector.exec(&self.ctx, &self.action).await
    }

    async fn acquire(&self) -> Result<Option<OwnedSemaphorePermit>> {
        let Some(semaphore) = &self.semaphore else {
            return Ok(None);
        };
        let permit = self
            .ctx
            .guard(async {
                semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::backend("acquire concurrency permit", e))
            })
            .await?;
        Ok(Some(permit))
    }

    async fn report(&self, err: &Error) {
        let report = FailureReport {
            request_id: self.ctx.request_id,
            action_id: self.action.id.clone(),
            action_type: self.action.kind.clone(),
            error: err.to_string(),
            chain: err.chain(),
        };
        match AssertUnwindSafe(self.reporter.report(&report)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "error reporter failed"),
            Err(panic) => tracing::warn!(
                panic = %panic_message(panic.as_ref()),
                "error reporter panicked"
            ),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
