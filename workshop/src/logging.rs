//! Diagnostic tracing for the downloader.
//!
//! Tracing output goes to stderr and is controlled by `RUST_LOG`; item
//! results and progress messages printed by the CLI go to stdout and are
//! unaffected by it.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Without it the filter is `warn`, or `workshop=debug` when
/// `verbose` is set. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=workshop=trace workshop download 294100 818773962
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,workshop=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
