//! Tracing setup for the `mbr` binary.

use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;

const FALLBACK_LEVEL: &str = "warn";
const VERBOSE_DIRECTIVE: &str = "media_browser=debug";

/// Build the filter: `RUST_LOG` wins, then the configured level.
///
/// `verbose` turns on debug output for this crate on top of either.
pub fn build_filter(config_level: &str, verbose: bool) -> EnvFilter {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL));
    match (verbose, VERBOSE_DIRECTIVE.parse::<Directive>()) {
        (true, Ok(directive)) => filter.add_directive(directive),
        _ => filter,
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Only the first call in a process takes effect.
pub fn init_logging(config_level: &str, verbose: bool) {
    let stderr_layer = Layer::new()
        .with_writer(std::io::stderr)
        .with_target(true);

    let _ = Registry::default()
        .with(build_filter(config_level, verbose))
        .with(stderr_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_adds_crate_directive() {
        let filter = build_filter("info", true);
        assert!(filter.to_string().contains(VERBOSE_DIRECTIVE));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging("warn", false);
        init_logging("debug", true);
        tracing::debug!(target: "media_browser::logging", "still running");
    }
}
