//! Tracing subscriber setup.

use chatrelay_core::LogLevel;
use tracing_subscriber::EnvFilter;

/// Filter for `level`, unless `RUST_LOG` supplies one.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_directive()))
}

/// Install the global fmt subscriber.
///
/// Later calls are ignored, so tests may call this freely.
pub fn init_tracing(level: LogLevel) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .try_init();
}
