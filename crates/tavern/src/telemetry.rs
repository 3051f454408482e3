//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Installs a global `tracing` subscriber that honours `RUST_LOG`.
///
/// Call once at startup. Later calls (and calls after another subscriber
/// was installed) are ignored.
pub fn init() {
    init_with(DEFAULT_FILTER);
}

/// Like [`init`], with a fallback filter for when `RUST_LOG` is unset.
pub fn init_with(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
