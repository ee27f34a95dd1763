use clap::{Args, Parser, Subcommand};
use hatchery_core::executor::ExecuteOptions;
use hatchery_core::selector::Selector;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "hatchery",
    version,
    about = "Collect audit logs from SaaS providers into cloud storage"
)]
pub struct Cli {
    /// Action file (YAML or JSON).
    #[arg(short = 'c', long, global = true, env = "HATCHERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Webhook that receives one JSON report per failed action.
    #[arg(long, global = true, env = "HATCHERY_ERROR_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// HMAC-SHA256 key used to sign webhook reports.
    #[arg(
        long,
        global = true,
        env = "HATCHERY_ERROR_WEBHOOK_SECRET",
        hide_env_values = true
    )]
    pub webhook_secret: Option<String>,

    /// Destination store: `gs://`, `memory://` or `file:///dir`.
    #[arg(long, global = true, env = "HATCHERY_STORAGE_URL", default_value = "gs://")]
    pub storage_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the selected actions.
    Exec(ExecArgs),

    /// Print the configured actions (id, type, tags).
    List,
}

#[derive(Debug, Clone, Args)]
pub struct ExecArgs {
    /// Action ids to run (repeatable or comma-delimited).
    #[arg(short = 'i', long = "id", env = "HATCHERY_EXEC_ID", value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Run every action carrying one of these tags.
    #[arg(short = 't', long = "tag", env = "HATCHERY_EXEC_TAG", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Run all configured actions.
    #[arg(short = 'a', long, env = "HATCHERY_EXEC_ALL")]
    pub all: bool,

    /// Log the plan without calling any provider or store.
    #[arg(short = 'd', long, env = "HATCHERY_EXEC_DRY_RUN")]
    pub dry_run: bool,

    /// Maximum number of actions running at once.
    #[arg(long, env = "HATCHERY_EXEC_MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,
}

impl ExecArgs {
    pub fn selector(&self) -> Selector {
        Selector {
            ids: self.ids.iter().cloned().collect(),
            tags: self.tags.iter().cloned().collect(),
            all: self.all,
        }
    }

    pub fn options(&self) -> ExecuteOptions {
        ExecuteOptions {
            dry_run: self.dry_run,
            max_concurrency: self.max_concurrency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exec_flags_build_selector() {
        let cli = Cli::try_parse_from([
            "hatchery", "exec", "-c", "a.yaml", "-i", "a,b", "--tag", "blue", "-d",
            "--max-concurrency", "4",
        ])
        .unwrap();
        let Commands::Exec(args) = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(cli.config, Some(PathBuf::from("a.yaml")));
        assert_eq!(cli.storage_url, "gs://");
        let sel = args.selector();
        assert_eq!(sel.ids.len(), 2);
        assert!(sel.tags.contains("blue"));
        assert!(!sel.all);
        assert_eq!(
            args.options(),
            ExecuteOptions {
                dry_run: true,
                max_concurrency: Some(4)
            }
        );
    }
}
