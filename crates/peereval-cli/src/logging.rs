//! Diagnostics for the CLI.
//!
//! Reads `RUST_LOG`, defaulting to `warn`. Output goes to stderr so JSON on
//! stdout stays parseable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// ```bash
/// RUST_LOG=peereval_core=debug peereval allocate --give 2=100
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
