//! Log output for the binary.
//!
//! The library logs through the `log` facade. [`init_logging`] installs a
//! `tracing-subscriber` formatter that also captures `log` records, filtered
//! by `DROPVAULT_LOG` (`info` when unset or unparsable).

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "DROPVAULT_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Build the filter from a `DROPVAULT_LOG` value such as `debug` or
/// `dropvault::queue=trace,info`.
pub fn log_filter(raw: Option<&str>) -> EnvFilter {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber, writing to stderr. Later calls are no-ops.
pub fn init_logging(raw: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(raw))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
