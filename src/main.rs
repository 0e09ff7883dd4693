use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use common::config::Configuration;
use common::logging::init_logging;
use purger::DeleteCoordinator;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "tsdbctl")]
#[command(about = "tsdbctl - administration of time-series tables in object storage")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete every object of a table
    #[command(alias = "del")]
    Delete {
        /// Table path inside the object store, e.g. tsdb/cpu_usage
        path: String,

        /// List the objects that would be deleted without deleting them
        #[arg(long)]
        dry_run: bool,
    },
    #[command(flatten)]
    Common(CommonCommands),
}

/// Cancels `token` on SIGINT or SIGTERM
async fn cancel_on_shutdown_signal(token: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => log::warn!("Received SIGINT, abandoning purge"),
            _ = sigterm.recv() => log::warn!("Received SIGTERM, abandoning purge"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        log::warn!("Received Ctrl+C, abandoning purge");
    }

    token.cancel();
    Ok(())
}

async fn delete_table(config: &Configuration, path: &str, dry_run: bool) -> Result<()> {
    let mut purge_config = config.purge.clone();
    purge_config.dry_run |= dry_run;
    purge_config.validate()?;

    let store = common::storage::create_object_store(&config.storage)
        .context("Failed to initialize object store")?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    let coordinator =
        DeleteCoordinator::for_object_store(store, purge_config).with_cancellation(cancel);
    let report = coordinator
        .delete_table(path)
        .await
        .with_context(|| format!("Failed to delete table {path}"))?;

    for key in &report.keys {
        println!("{key}");
    }
    if report.dry_run {
        println!("{} objects would be deleted from {}", report.len(), report.path);
    } else {
        println!("deleted {} objects from {}", report.len(), report.path);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = utils::load_config(&cli.common)?;
    init_logging(utils::log_level(&cli.common, &config));

    match cli.command {
        Commands::Delete { path, dry_run } => delete_table(&config, &path, dry_run).await,
        Commands::Common(command) => utils::handle_common_command(&command, &config),
    }
}
