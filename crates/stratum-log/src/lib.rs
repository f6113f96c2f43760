//! Structured logging for the storage core.
//!
//! Span-based, filterable logging via the `tracing` ecosystem: console
//! output with uptime timestamps and module paths, plus JSON file logging in
//! debug builds for post-mortem analysis. The filter honors `RUST_LOG` and
//! falls back to the configured log level.

use std::path::Path;

use stratum_config::EngineConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when neither `RUST_LOG` nor the config override is set.
const DEFAULT_FILTER: &str = "info";

/// Initializes the tracing subscriber.
///
/// # Arguments
///
/// * `log_dir` — optional directory for JSON log files (debug builds only)
/// * `debug_build` — whether this is a debug build (enables file logging)
/// * `config` — optional configuration supplying a log level override
///
/// Call once at process startup; later calls are rejected by the subscriber
/// registry and ignored here.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&EngineConfig>) {
    let filter_str = config
        .map(|c| c.debug.log_level.as_str())
        .filter(|level| !level.is_empty())
        .unwrap_or(DEFAULT_FILTER);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join("stratum.log"))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        let _ = subscriber.with(file_layer).try_init();
        return;
    }

    let _ = subscriber.try_init();
}

/// The default `EnvFilter` used when nothing overrides it.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        let filter = default_env_filter();
        assert!(format!("{filter}").contains("info"));
    }

    #[test]
    fn test_per_crate_filter_parses() {
        let filter = EnvFilter::new("info,stratum_world=debug,stratum_queue=trace");
        let text = format!("{filter}");
        assert!(text.contains("stratum_world=debug"));
        assert!(text.contains("stratum_queue=trace"));
    }

    #[test]
    fn test_config_override_is_used() {
        let mut config = EngineConfig::default();
        config.debug.log_level = "warn".to_string();
        // init_logging must not panic, and repeated initialization is benign.
        init_logging(None, false, Some(&config));
        init_logging(None, false, Some(&config));
    }

    #[test]
    fn test_file_logging_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        init_logging(Some(&log_dir), true, None);
        assert!(log_dir.exists());
    }
}
