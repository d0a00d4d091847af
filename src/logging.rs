//! Tracing subscriber bootstrap for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `VOICEMIX_LOG`, then `RUST_LOG`, then `info`.
///
/// Returns `false` when a global subscriber was already set; calling it more
/// than once is harmless.
pub fn init_tracing() -> bool {
    let filter = filter_from(
        std::env::var("VOICEMIX_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

fn filter_from(primary: Option<String>, fallback: Option<String>) -> EnvFilter {
    [primary, fallback]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .find_map(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
