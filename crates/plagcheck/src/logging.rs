//! Subscriber setup for binaries embedding the library.
//!
//! `PLAGCHECK_LOG` takes precedence over `RUST_LOG`; without either the
//! level follows the verbosity count. Records emitted through the `log`
//! crate are forwarded into the same subscriber.

use thiserror::Error;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "PLAGCHECK_LOG";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("A global subscriber is already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Failed to forward log records: {0}")]
    LogBridge(#[from] log::SetLoggerError),
}

/// Default directive for `-v` repetitions: 0 warn, 1 info, 2 debug, 3+ trace.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn env_filter(verbosity: u8) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::new(default_directive(verbosity))
}

/// Installs the global subscriber writing to stderr, as JSON lines when
/// `json` is set. Call once, early in `main`.
pub fn init(verbosity: u8, json: bool) -> Result<(), LoggingError> {
    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbosity > 1)
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(json_layer)
        .with(text_layer);

    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}
