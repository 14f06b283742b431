//! Logging setup for the replay binary
//!
//! Logs go to stderr so stdout stays a clean CSV stream. `RUST_LOG`, when
//! set, overrides the level given on the command line.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber
///
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging("debug");
        init_logging("info");
        tracing::info!("logging initialised");
    }
}
