// src/logging.rs

use color_eyre::eyre::Result;
use tracing_error::ErrorLayer;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initializes stderr logging through the tracing subscriber.
///
/// The filter is taken from `RUST_LOG` when set, falling back to `info` for
/// this crate only so that dependency noise stays out of scan output.
pub fn initialize_logging() -> Result<()> {
    let log_level = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();

    Ok(())
}
