//! Tracing setup for tests.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a fmt subscriber that writes to the per-test output buffer.
///
/// The filter comes from `RUST_LOG` and defaults to `sheetkv_core=debug`.
/// Calling it more than once is harmless.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sheetkv_core=debug"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
