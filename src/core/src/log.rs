//! Tracing subscriber setup for embedders of the build engine.

use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

/// Build the filter for `level`, letting `RUST_LOG` override it.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Install a global fmt subscriber.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one is left in place.
pub fn init_tracing(level: LogLevel) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .try_init()
        .is_ok()
}
