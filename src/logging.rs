//! Diagnostics for the binaries. Everything goes to stderr, stdout carries
//! the stream.

use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the error report hooks and a subscriber honoring `RUST_LOG`.
/// Without it the level follows the number of `-v` flags.
pub fn init(verbosity: u8) -> color_eyre::Result<()> {
    color_eyre::install()?;

    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let fmt = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .with(ErrorLayer::default())
        .try_init()?;
    Ok(())
}
