//! Logging bootstrap
//!
//! Library code only emits `tracing` events. Binaries and tests call
//! [`init`] once to get formatted output on stderr.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info,soda_core=info,soda_library=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `default_filter`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}

/// Same as [`init`] with [`DEFAULT_FILTER`]
pub fn init_default() -> bool {
    init(DEFAULT_FILTER)
}
