//! Tracing subscriber setup
//!
//! The library only emits `tracing` events; binaries decide where they go.

use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "libreshelf=info,shelfctl=info";

/// Install a formatted subscriber honouring `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(verbose: bool) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("libreshelf=debug,shelfctl=debug"),
        Err(_) => EnvFilter::new(DEFAULT_FILTER),
    };

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    tracing::debug!("Logging initialised");
}
