use clap::Parser;
use hatchery_cli::cli::Cli;
use hatchery_core::o11y::{LogFormat, init_tracing};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::from_env())?;
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling run");
            on_interrupt.cancel();
        }
    });

    if let Err(err) = hatchery_cli::app::run(cli, cancel).await {
        tracing::error!(error = %err, "hatchery failed");
        return Err(err.into());
    }
    Ok(())
}
