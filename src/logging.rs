//! Tracing subscriber setup for the binary.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Install a stderr fmt subscriber.
///
/// An explicit `level` wins over `RUST_LOG`; with neither, `info` is used.
/// Calling this more than once leaves the first subscriber in place.
pub fn init(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}
