use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tsdbctl.toml";

/// Prefix for environment overrides, nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "TSDBCTL__";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Object store DSN: file:///path, memory:// or s3://[key:secret@]host[:port]/bucket
    pub dsn: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("file:///.data/tsdb"),
        }
    }
}

/// Settings for bulk table deletion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurgeConfig {
    /// Upper bound on the drain phase, measured from the end of enumeration.
    ///
    /// Env: TSDBCTL__PURGE__DRAIN_TIMEOUT
    #[serde(with = "humantime_serde", default = "default_drain_timeout")]
    pub drain_timeout: Duration,

    /// Capacity of the completion channel shared by all in-flight deletes.
    ///
    /// Env: TSDBCTL__PURGE__COMPLETION_BUFFER
    #[serde(default = "default_completion_buffer")]
    pub completion_buffer: usize,

    /// List what would be deleted without submitting any delete.
    ///
    /// Env: TSDBCTL__PURGE__DRY_RUN
    #[serde(default)]
    pub dry_run: bool,
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_completion_buffer() -> usize {
    1000
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            drain_timeout: default_drain_timeout(),
            completion_buffer: default_completion_buffer(),
            dry_run: false,
        }
    }
}

impl PurgeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.drain_timeout.is_zero() {
            anyhow::bail!("purge.drain_timeout must be positive");
        }

        if self.completion_buffer == 0 {
            anyhow::bail!(
                "purge.completion_buffer must be positive, got {}",
                self.completion_buffer
            );
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of debug, info, warn, error. Unknown values fall back to info.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Object storage holding the tables
    #[serde(default)]
    pub storage: StorageConfig,
    /// Bulk delete behaviour
    #[serde(default)]
    pub purge: PurgeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Configuration {
    /// Load defaults, then `tsdbctl.toml` from the working directory, then
    /// `TSDBCTL__*` environment variables.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::layered(Toml::file(DEFAULT_CONFIG_FILE))
            .extract()
            .map_err(Box::new)
    }

    /// Same as [`Configuration::load`] with an explicit configuration file,
    /// which unlike the default one has to exist.
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        if !path.is_file() {
            return Err(Box::new(figment::Error::from(format!(
                "configuration file {} does not exist",
                path.display()
            ))));
        }
        Self::layered(Toml::file(path)).extract().map_err(Box::new)
    }

    fn layered(file: figment::providers::Data<Toml>) -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.dsn.is_empty() {
            anyhow::bail!("storage.dsn cannot be empty");
        }
        self.purge.validate()
    }
}
