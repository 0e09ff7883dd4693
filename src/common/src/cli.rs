use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Arguments shared by every tsdbctl subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Object store DSN, overrides storage.dsn (file:///path, memory://, s3://host/bucket)"
    )]
    pub storage: Option<String>,

    #[arg(
        short,
        long,
        global = true,
        value_name = "LEVEL",
        help = "Log level: debug, info, warn, error"
    )]
    pub verbose: Option<String>,

    #[arg(short, long, global = true, help = "Only log warnings and errors")]
    pub quiet: bool,
}

/// Housekeeping subcommands that never touch the object store
#[derive(Subcommand, Debug, Clone)]
pub enum CommonCommands {
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};

    /// Resolve the log level from the flags, falling back to the configuration
    pub fn log_level<'a>(args: &'a CommonArgs, config: &'a Configuration) -> &'a str {
        if args.quiet {
            "warn"
        } else {
            args.verbose.as_deref().unwrap_or(&config.logging.level)
        }
    }

    /// Load configuration and apply command line overrides
    pub fn load_config(args: &CommonArgs) -> Result<Configuration> {
        let mut config = match &args.config {
            Some(path) => {
                Configuration::load_from_path(path).context("Failed to load configuration")?
            }
            None => Configuration::load().context("Failed to load configuration")?,
        };

        if let Some(dsn) = &args.storage {
            config.storage.dsn = dsn.clone();
        }

        Ok(config)
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("tsdbctl configuration:");
            println!("======================");
            println!("Storage DSN: {}", config.storage.dsn);
            println!("Drain timeout: {:?}", config.purge.drain_timeout);
            println!("Completion buffer: {}", config.purge.completion_buffer);
            println!("Dry run: {}", config.purge.dry_run);
            println!("Log level: {}", config.logging.level);
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");
        config.validate()?;
        crate::storage::StorageLocation::parse(&config.storage.dsn)?;
        log::info!("Configuration validation passed");
        Ok(())
    }

    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<()> {
        match command {
            CommonCommands::Config { json } => display_config(config, *json),
            CommonCommands::Validate => validate_config(config),
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(())
            }
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
