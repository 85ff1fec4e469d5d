//! Diagnostics on stderr; stdout is reserved for tables and JSON.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "PORTWHO_LOG";

/// Install the global subscriber.
///
/// `PORTWHO_LOG` wins over `RUST_LOG`, which wins over `level`.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(format!("portwho={level}")));

    // Ignore a second initialisation (tests, embedding).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .try_init();
}
