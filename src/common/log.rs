//! Logging setup emitting JSON lines (or human readable output) via tracing.

use tracing_subscriber::{fmt, EnvFilter};

use crate::common::config::LoggingCfg;

/// Install the global subscriber writing to stderr. Repeated calls are no-ops.
pub fn init(cfg: &LoggingCfg) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if cfg.json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(level = %cfg.level, json = cfg.json, "logging initialised");
    }
}
