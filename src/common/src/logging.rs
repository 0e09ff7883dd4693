use tracing_subscriber::EnvFilter;

/// Log verbosity accepted on the command line and in `logging.level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Map a verbosity string to a level. Anything unrecognised is `Info`.
    pub fn from_verbosity(verbose: &str) -> Self {
        match verbose.trim().to_ascii_lowercase().as_str() {
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over `verbose` when it is set. Calling this more than once
/// is harmless, later calls are ignored.
pub fn init_logging(verbose: &str) {
    let level = LogLevel::from_verbosity(verbose);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
