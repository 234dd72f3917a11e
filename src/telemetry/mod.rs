//! Tracing initialization.
//!
//! Sets up tracing-subscriber with an env-filter and a fmt layer. The
//! RUST_LOG environment variable takes precedence over the configured level.

use crate::error::{Error, Result};

/// Initialize the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a subscriber was already set.
pub fn init_telemetry(default_level: &str) -> Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| Error::Other(format!("failed to init tracing subscriber: {e}")))?;

    Ok(())
}
