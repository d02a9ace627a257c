//! Logging bootstrap.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides `default_directive`
/// (e.g. `"provix=info"`).
///
/// Fails when a subscriber is already installed.
pub fn init_logging(default_directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .with_context(|| format!("invalid log directive {default_directive:?}"))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init()
        .context("logging already initialized")?;
    Ok(())
}

/// Like [`init_logging`], but a second call is a no-op.
pub fn try_init_logging(default_directive: &str) {
    let _ = init_logging(default_directive);
}
