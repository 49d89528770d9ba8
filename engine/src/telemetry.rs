//! Telemetry and Observability
//!
//! Handles setting up `tracing-subscriber` for structured logging.
//! Supports settings-driven log levels, environment variable overrides,
//! and format switching between pretty (debug) and JSON (release).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber with the given log level from settings.
///
/// Priority: `RUST_LOG` env var > `log_level` parameter > default "info"
///
/// In debug builds: pretty-printed terminal output on stderr.
/// In release builds: JSON structured output with spans on stderr.
pub fn init_telemetry_with_level(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(log_level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    }
}

/// Initialize the tracing subscriber with default settings.
///
/// Falls back to "info" level if no `RUST_LOG` env var is set.
/// Use `init_telemetry_with_level` when settings are available.
pub fn init_telemetry() {
    init_telemetry_with_level("info");
}

fn default_filter(log_level: &str) -> String {
    format!("{},pilot_engine={}", log_level, log_level)
}
