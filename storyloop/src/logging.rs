//! Development-time tracing for debugging the loop.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG`, output to stderr.
//!   Not part of the operator-facing output.
//!
//! - **Console (`console`)**: Timestamped progress lines for the operator.
//!   Always printed, unaffected by `RUST_LOG`.

use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Without it, defaults to `debug` for this crate in
/// verbose mode and `warn` otherwise. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=storyloop=trace storyloop --resume
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,storyloop=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second init (e.g. from tests) keeps the first subscriber.
    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
    {
        debug!(err = %err, "tracing already initialized, keeping existing subscriber");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init(false);
        init(true);
        debug!("still logging after a second init");
    }
}
