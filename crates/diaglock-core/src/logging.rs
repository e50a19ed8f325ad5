//! Logger bootstrap shared by the CLI and any embedding service.

use env_logger::Builder;
use std::sync::Once;

/// Environment variable consulted for the log filter before `RUST_LOG`.
pub const LOG_ENV: &str = "DIAGLOCK_LOG";

static INIT: Once = Once::new();

/// Install the global logger once; later calls are no-ops.
///
/// The filter comes from `DIAGLOCK_LOG`, then `RUST_LOG`, then `default_level`.
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let filter = std::env::var(LOG_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| default_level.to_string());

        let mut builder = Builder::new();
        builder.parse_filters(&filter);
        builder.format_timestamp_secs();
        // Another logger may already be installed by an embedding binary.
        let _ = builder.try_init();
    });
}
