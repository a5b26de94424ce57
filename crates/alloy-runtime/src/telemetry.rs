//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, DEFAULT_LOG_FILTER};

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` wins over `filter`. An unparsable `filter` falls back to
/// [`DEFAULT_LOG_FILTER`]. Returns `false` if a global subscriber was
/// already installed, in which case nothing changes.
pub fn init_tracing(filter: &str, format: LogFormat) -> bool {
    let filter = resolve_filter(filter);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.is_ok()
}

fn resolve_filter(filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| parse_filter(filter))
}

fn parse_filter(filter: &str) -> EnvFilter {
    EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
