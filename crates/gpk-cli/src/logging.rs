//! Logging initialization for the CLI.
//!
//! Logging is owned by the CLI crate so gpk-core stays quiet when
//! embedded. Structured output goes to stderr; stdout is reserved for
//! command results.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber.
///
/// # Arguments
/// * `verbosity` - 0 = INFO, 1 = DEBUG, 2+ = TRACE
///
/// `RUST_LOG` is respected, with the verbosity flag layered on top.
///
/// # Panics
/// Panics if a subscriber is already installed.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive(format!("gpk={level}").parse().unwrap())
        .add_directive(format!("gpk_core={level}").parse().unwrap());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
