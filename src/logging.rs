//! Tracing setup for host applications.

use color_eyre::{eyre::eyre, Result};
use tracing_subscriber::EnvFilter;

/// Install the error report handler and a fmt subscriber. Call once at
/// startup; `RUST_LOG` overrides the default filter.
pub fn init() -> Result<()> {
  color_eyre::install()?;

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("showroom=info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(())
}
