//! Logging.

use anyhow::Context as _;
use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

mod config;
pub use self::config::{LogLevel, LoggingConfiguration};

/// Logs a message to standard error and exits the process with a non-zero exit code.
pub fn fatal_and_exit(message: String) -> ! {
    eprintln!("FATAL: {}", message);
    std::process::exit(1);
}

/// Initializes the global `tracing` subscriber.
///
/// Events are filtered by `log_level` and written to standard error, either in a human-readable format or, when
/// `log_format_json` is set, as one JSON object per line. Standard output is left untouched so that it can carry data.
///
/// # Errors
///
/// If a global subscriber was already installed, an error will be returned.
pub fn initialize_logging(config: &LoggingConfiguration) -> Result<(), anyhow::Error> {
    let format_layer = if config.log_format_json {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_writer(std::io::stderr).boxed()
    };

    tracing_subscriber::registry()
        .with(format_layer.with_filter(config.log_level.as_env_filter()))
        .try_init()
        .context("Logging was already initialized.")
}
