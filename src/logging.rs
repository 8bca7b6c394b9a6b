//! Tracing setup for the binary.
//!
//! Logs always go to stderr: stdout carries the MCP protocol.

use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

/// `RUST_LOG` wins; otherwise `level`, otherwise the default level.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = build_filter(&config.level);

    let json_layer = config.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(false)
    });
    let text_layer = (!config.json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
}
