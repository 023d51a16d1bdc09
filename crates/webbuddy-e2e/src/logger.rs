//! Logging setup for the harness.
//!
//! Diagnostic chatter (context enumeration, identifier inference, page
//! console forwarding) is logged at `info` so it is always available for
//! triage; debug mode adds the browser crate's internals.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "webbuddy_e2e=info,webbuddy_browser=info";
const VERBOSE_FILTER: &str = "webbuddy_e2e=debug,webbuddy_browser=debug";

/// Installs the global subscriber. Call once, before any logging.
///
/// `RUST_LOG` takes precedence unless `verbose` is set.
pub fn init_logger(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init();
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_parse() {
        let _ = env_filter(true);
        let _ = EnvFilter::new(DEFAULT_FILTER);
    }

    #[test]
    fn repeated_init_does_not_panic() {
        init_logger(false);
        init_logger(true);
    }
}
