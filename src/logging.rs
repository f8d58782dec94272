//! Tracing setup for the datalab binary.
//!
//! Logs go to stderr so that stdout carries nothing but NDJSON.
//!
//!   datalab --debug export ...          # debug logging
//!   RUST_LOG=datalab=trace datalab ...  # fine-grained control

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    /// Default to `debug` instead of `info` when `RUST_LOG` is unset.
    pub debug: bool,
}

pub fn init(config: LogConfig) -> Result<()> {
    let default_level = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.debug)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
