//! Logging setup for binaries built on Tidesync.
//!
//! Library crates only emit `tracing` events. Installing a subscriber is
//! left to the binary, which calls [`init_logging`] once at startup.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` is used as the filter
/// (e.g. `"info"` or `"tidesync=debug,info"`). With `json`, events are
/// written as one JSON object per line.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_logging(level: &str, json: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()?;
    }

    tracing::debug!(level, json, "logging initialized");
    Ok(())
}
