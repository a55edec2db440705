//! Development-time tracing.
//!
//! Tracing output is diagnostics only. The conversation log and the preview
//! console are product output and do not depend on `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; falls back to `default_directive` when unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=studio=debug studio run "add a reset button"
/// ```
pub fn init(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
