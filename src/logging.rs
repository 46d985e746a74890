//! Tracing subscriber setup. Logs go to stderr so stdout stays clean for
//! command output.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured directive; a directive that does not
/// parse falls back to the default. Calling this twice is harmless.
pub fn init(config: &LoggingConfig, debug: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(config, debug))
        .with_ansi(config.ansi)
        .with_target(debug)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_filter(config: &LoggingConfig, debug: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let directive = if debug {
        "cookie_triage=debug"
    } else {
        config.filter.as_str()
    };

    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("cookie_triage=info"))
}
