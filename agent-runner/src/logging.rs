//! Diagnostic logging for the runner.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: runner and Codex diagnostics, filtered via
//!   `RUST_LOG`, written to stderr. The host forwards these lines to its own log
//!   and never parses them.
//!
//! - **Result records (`io/output`)**: marker-delimited JSON on stdout. Always
//!   written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `info` so turn progress and Codex
/// stderr reach the host log.
/// Output: stderr, compact format, no ANSI colours.
///
/// # Example
/// ```bash
/// RUST_LOG=agent_runner=debug agent-runner run < input.json
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .compact(),
        )
        .init();
}
