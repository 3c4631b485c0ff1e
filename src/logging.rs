//! Tracing subscriber setup for the CLI.
//!
//! Logs go to stderr so stdout stays clean for JSON output. `RUST_LOG`
//! always wins; otherwise the configured level applies to this crate.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(config: &LoggingConfig, verbose: bool) -> String {
    let level = if verbose { "debug" } else { config.level.as_str() };
    format!("newsrank={level}")
}

/// Install the global subscriber once; later calls are no-ops.
pub fn init_logging(config: &LoggingConfig, verbose: bool) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let directive = default_directive(config, verbose);
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        let config = LoggingConfig {
            level: "warn".to_string(),
        };
        assert_eq!(default_directive(&config, false), "newsrank=warn");
        assert_eq!(default_directive(&config, true), "newsrank=debug");
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = LoggingConfig::default();
        init_logging(&config, false);
        init_logging(&config, true);
    }
}
