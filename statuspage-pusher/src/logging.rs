//! Structured logging setup.
//!
//! Logs go through `tracing`; [`init_logging`] installs a `tracing-subscriber`
//! registry with an env filter and either a human-readable or JSON formatter.
//! `RUST_LOG`, when set, takes precedence over the configured levels.

use tracing::Level;

/// Configuration for the pusher's logging setup.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for dependencies (HTTP stack, runtime)
    pub level: Level,
    /// Log level for the pusher itself
    pub pusher_level: Level,
    /// Whether to use JSON output format
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            pusher_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Creates a configuration logging the pusher at `level`.
    pub fn new(level: Level) -> Self {
        Self {
            pusher_level: level,
            level: level.min(Level::WARN),
            ..Self::default()
        }
    }

    /// Sets whether to use JSON output format.
    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    /// Builds the environment filter string.
    pub fn env_filter(&self) -> String {
        format!(
            "{},statuspage_pusher={}",
            self.level.as_str().to_lowercase(),
            self.pusher_level.as_str().to_lowercase()
        )
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

    let fmt_layer = if config.json_format {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
