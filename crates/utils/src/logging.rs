//! Process-wide tracing bootstrap.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Default filter directive for the current build mode.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) { "debug" } else { "info" }
}

/// Installs the global `fmt` subscriber.
///
/// `RUST_LOG` wins over `default_directive`. Repeated calls are no-ops, and a
/// subscriber installed elsewhere (e.g. by a test harness) is left in place.
pub fn init_tracing(default_directive: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init();
    });
}
