//! Logging setup shared by both binaries.
//!
//! Logs always go to stderr: the server's stdout carries protocol frames
//! and the console's stdout belongs to the conversation.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

use super::config::LoggingConfig;

/// Map a level name to a tracing level, defaulting to INFO.
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the logging subsystem.
///
/// `RUST_LOG` directives are honored; the configured level is added on top.
pub fn init_logging(config: &LoggingConfig) {
    let level = parse_level(&config.level);
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    // try_init: a second call (tests, embedding) keeps the first subscriber.
    let _ = if config.with_timestamps {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };
}
