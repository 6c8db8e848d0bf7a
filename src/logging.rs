//! Logging setup.
//!
//! The library only emits `tracing` events. Applications call [`init_logging`] once to
//! install a formatted subscriber; the filter is read from `RUST_LOG` and falls back to the
//! given default level.
use tracing_subscriber::EnvFilter;

use crate::GalaxyError;

/// Install a global `tracing` subscriber writing to stderr.
///
/// Arguments
/// -----------------
/// * `default_level`: filter directive used when `RUST_LOG` is unset or invalid (e.g. `"info"`).
///
/// Return
/// ----------
/// * `Err(GalaxyError::InvalidParameter)` when a global subscriber is already installed.
pub fn init_logging(default_level: &str) -> Result<(), GalaxyError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| GalaxyError::InvalidParameter(format!("logging already initialized: {e}")))
}
