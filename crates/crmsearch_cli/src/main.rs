//! `crmsearch-index`: manage the CRM search indices.
//!
//! # Responsibility
//! - Parse scope, action, force flag and connection selector.
//! - Wire the configured stores into the lifecycle manager.
//! - Map outcomes to exit codes: 0 success or declined confirmation,
//!   1 runtime failure, 2 usage error.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use crmsearch_core::config::DEFAULT_CONNECTION;
use crmsearch_core::{
    default_log_level, default_registry, init_logging, Action, AppConfig, Backends,
    IndexLifecycleManager, LifecycleError, Outcome, SqliteEngine, SqliteStore, TerminalConfirm,
};
use log::info;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const EXIT_RUNTIME: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "crmsearch-index", version, about = "Manage the CRM search indices")]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["create", "populate", "delete", "rebuild"])
))]
struct Cli {
    /// Entity groups or `group.entity` names to act on (default: all).
    #[arg(long, num_args = 0..)]
    models: Vec<String>,

    /// Create new index generations; aliases are only set when missing.
    #[arg(long)]
    create: bool,

    /// Index every record through the current aliases.
    #[arg(long)]
    populate: bool,

    /// Delete every generation of the selected indices.
    #[arg(long)]
    delete: bool,

    /// Build, fill and swap in fresh generations, then drop the old ones.
    #[arg(long)]
    rebuild: bool,

    /// Skip the confirmation prompt.
    #[arg(short, long)]
    force: bool,

    /// Search-engine connection to use.
    #[arg(long, default_value = DEFAULT_CONNECTION)]
    using: String,

    /// JSON configuration file (falls back to CRMSEARCH_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn action(&self) -> Action {
        if self.create {
            Action::Create
        } else if self.populate {
            Action::Populate
        } else if self.delete {
            Action::Delete
        } else {
            Action::Rebuild
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    let usage = err
        .downcast_ref::<LifecycleError>()
        .is_some_and(LifecycleError::is_usage);
    if usage {
        EXIT_USAGE
    } else {
        EXIT_RUNTIME
    }
}

fn run(cli: &Cli) -> Result<Outcome> {
    // Scope names are checked before any file is touched.
    let registry = Arc::new(default_registry()?);
    registry
        .select(cli.models.as_slice())
        .map_err(LifecycleError::from)?;

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(log_dir) = &config.log_dir {
        let level = config.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &log_dir.to_string_lossy()).context("failed to start logging")?;
    }

    let connection = config.connection(&cli.using)?;
    let store = SqliteStore::open(&config.database)
        .with_context(|| format!("failed to open `{}`", config.database.display()))?;
    let engine = SqliteEngine::open(&connection.engine)
        .with_context(|| format!("failed to open `{}`", connection.engine.display()))?;

    let manager = IndexLifecycleManager::new(
        registry,
        Backends::new(Arc::new(store), Arc::new(engine)),
    )
    .with_batch_size(config.populate_batch_size);

    let action = cli.action();
    info!(
        "event=cli_run module=cli status=start action={} using={}",
        action.as_str(),
        cli.using
    );
    let mut stdout = std::io::stdout().lock();
    let outcome = manager.run(
        action,
        cli.models.as_slice(),
        cli.force,
        &mut TerminalConfirm,
        &mut stdout,
    )?;
    stdout.flush()?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::{exit_code, run, Cli, EXIT_USAGE};
    use clap::error::ErrorKind;
    use clap::{CommandFactory, Parser};
    use crmsearch_core::Action;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_scopes_and_action() {
        let cli = Cli::try_parse_from([
            "crmsearch-index",
            "--models",
            "accounts",
            "users.user",
            "--rebuild",
            "-f",
        ])
        .expect("valid arguments");
        assert_eq!(cli.models, vec!["accounts", "users.user"]);
        assert_eq!(cli.action(), Action::Rebuild);
        assert!(cli.force);
        assert_eq!(cli.using, "default");
    }

    #[test]
    fn action_is_required_and_exclusive() {
        let missing = Cli::try_parse_from(["crmsearch-index"]).expect_err("no action");
        assert_eq!(missing.kind(), ErrorKind::MissingRequiredArgument);

        let both = Cli::try_parse_from(["crmsearch-index", "--create", "--delete"])
            .expect_err("two actions");
        assert_eq!(both.kind(), ErrorKind::ArgumentConflict);
        assert_eq!(both.exit_code(), 2);
    }

    #[test]
    fn unknown_scope_is_reported_before_opening_any_database() {
        let cli = Cli::try_parse_from([
            "crmsearch-index",
            "--models",
            "cases",
            "--create",
            "--config",
            "/nonexistent/crmsearch/config.json",
        ])
        .expect("valid arguments");

        let err = run(&cli).expect_err("unknown scope");
        assert_eq!(err.to_string(), "No model or app named cases");
        assert_eq!(exit_code(&err), EXIT_USAGE);
    }
}
