//! Process-wide `tracing` setup: a formatting layer plus an env-filter.

use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber filtered to `level`. `RUST_LOG`, when
/// set, takes priority over `level` so a user can still get full-crate
/// diagnostics without touching the CLI flag.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}
