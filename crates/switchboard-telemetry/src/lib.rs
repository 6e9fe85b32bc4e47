//! Logging setup for Switchboard
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either
//! human-readable or JSON output.

use switchboard_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Resolve the effective filter directive
///
/// The config value wins, then `RUST_LOG`, then `default_filter`.
fn build_filter(config: Option<&LoggingConfig>, default_filter: &str) -> EnvFilter {
    if let Some(directive) = config.and_then(|c| c.filter.as_deref()) {
        match EnvFilter::try_new(directive) {
            Ok(filter) => return filter,
            Err(e) => eprintln!("invalid logging.filter '{directive}': {e}; falling back"),
        }
    }

    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging from configuration
///
/// Must be called once, before the first log line is emitted.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init(config: Option<&LoggingConfig>, default_filter: &str) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = build_filter(config, default_filter);
    let format = config.map(|c| c.format).unwrap_or_default();

    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}
