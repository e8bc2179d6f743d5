//! Global `tracing` subscriber.
use anyhow::{anyhow, Context, Result};
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Install a formatted stderr subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive` (e.g. `"info"` or
/// `"biocarousel=debug"`). Installing a second subscriber is an error.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .with_context(|| format!("invalid log directive '{default_directive}'"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))
}
