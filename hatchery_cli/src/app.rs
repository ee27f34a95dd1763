//! Wiring between the parsed command line and the core executor.

use crate::cli::{Cli, Commands, ExecArgs};
use crate::config::ActionsFile;
use hatchery_core::executor::Executor;
use hatchery_core::http::HttpTransport;
use hatchery_core::models::Action;
use hatchery_core::report::{ErrorReporter, NoopReporter};
use hatchery_core::{Error, Result};
use hatchery_integrations::{ObjectStoreSink, ReqwestTransport, WebhookReporter};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let path = cli.config.as_deref().ok_or_else(|| {
        Error::InvalidOption("an action file is required (--config or HATCHERY_CONFIG)".to_string())
    })?;
    let file = ActionsFile::load(path)?;

    match &cli.command {
        Commands::List => {
            let mut stdout = std::io::stdout().lock();
            write_action_list(&file.actions, &mut stdout)
        }
        Commands::Exec(args) => exec(&cli, args, &file.actions, cancel).await,
    }
}

#[tracing::instrument(level = "info", skip_all, fields(config = %display_path(cli.config.as_deref())))]
async fn exec(
    cli: &Cli,
    args: &ExecArgs,
    actions: &[Action],
    cancel: CancellationToken,
) -> Result<()> {
    let selector = args.selector();
    selector.validate()?;

    let http: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
    // A dry run only logs the plan; storage and webhook settings are not opened.
    let (sink, reporter): (Arc<ObjectStoreSink>, Arc<dyn ErrorReporter>) = if args.dry_run {
        (Arc::new(ObjectStoreSink::in_memory()), Arc::new(NoopReporter))
    } else {
        let reporter: Arc<dyn ErrorReporter> = match &cli.webhook_url {
            Some(url) if !url.trim().is_empty() => Arc::new(
                WebhookReporter::new(url.clone(), http.clone())
                    .with_signing_secret(cli.webhook_secret.clone()),
            ),
            _ => Arc::new(NoopReporter),
        };
        (Arc::new(ObjectStoreSink::from_url(&cli.storage_url)?), reporter)
    };
    let registry = Arc::new(hatchery_integrations::default_registry().await?);

    let executor = Executor::new(registry, sink, http)
        .with_reporter(reporter)
        .with_options(args.options());
    executor
        .execute_with_cancel(actions, &selector, cancel)
        .await
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}

/// One tab-separated line per action: id, type, comma-joined tags.
pub fn write_action_list(actions: &[Action], out: &mut impl Write) -> Result<()> {
    for action in actions {
        let tags = action.tags.iter().cloned().collect::<Vec<_>>().join(",");
        writeln!(out, "{}\t{}\t{}", action.id, action.kind, tags)
            .map_err(|e| Error::backend("write action list", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write as _;

    fn actions_file(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    const ACTIONS: &str = "\
actions:
  - id: s1
    type: slack
    tags: [saas]
    bucket: logs
    settings: {access_token: t}
  - id: ghost
    type: gopher
    tags: [misc]
    bucket: logs
";

    #[test]
    fn list_prints_id_type_tags() {
        let file = ActionsFile::parse(ACTIONS, crate::config::FileFormat::Yaml).unwrap();
        let mut out = Vec::new();
        write_action_list(&file.actions, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "s1\tslack\tsaas\nghost\tgopher\tmisc\n"
        );
    }

    #[tokio::test]
    async fn missing_config_is_an_error() {
        let err = run(cli(&["hatchery", "exec", "--all"]), CancellationToken::new()).await;
        assert!(matches!(err, Err(Error::InvalidOption(_))));
    }

    #[tokio::test]
    async fn invalid_selector_fails_before_execution() {
        let f = actions_file(ACTIONS);
        let path = f.path().to_str().unwrap();
        let err = run(
            cli(&["hatchery", "exec", "-c", path, "--all", "--id", "s1", "--storage-url", "memory://"]),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(err, Err(Error::InvalidOption(_))));
    }

    #[tokio::test]
    async fn dry_run_succeeds_without_network() {
        let f = actions_file(ACTIONS);
        let path = f.path().to_str().unwrap();
        run(
            cli(&["hatchery", "exec", "-c", path, "-a", "-d", "--storage-url", "memory://"]),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn dry_run_ignores_storage_url() {
        let f = actions_file(ACTIONS);
        let path = f.path().to_str().unwrap();
        run(
            cli(&["hatchery", "exec", "-c", path, "-a", "-d", "--storage-url", "s3://nope"]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let err = run(
            cli(&["hatchery", "exec", "-c", path, "-a", "--storage-url", "s3://nope"]),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn unknown_type_fails_only_its_action() {
        let f = actions_file(ACTIONS);
        let path = f.path().to_str().unwrap();
        let err = run(
            cli(&["hatchery", "exec", "-c", path, "-t", "misc", "--storage-url", "memory://"]),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        let failures = match err {
            Error::ActionFailed { failures } => failures,
            other => panic!("expected aggregate, got {other:?}"),
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].action_id, "ghost");
        assert!(matches!(failures[0].error, Error::UnknownActionType { .. }));
    }
}
