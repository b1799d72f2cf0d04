use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ConfigError, LogFormat, LogLevel};

/// Initialize structured logging to stdout.
///
/// - `LogFormat::Json`: flattened JSON for log aggregators.
/// - `LogFormat::Text`: human-readable colored output.
///
/// Uses `RUST_LOG` if set, otherwise the given `level`. Must be called
/// exactly once at startup.
pub fn init_logging(level: LogLevel, format: LogFormat) -> Result<(), ConfigError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_target(true)
                    .with_ansi(false),
            )
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().pretty().with_target(true).with_ansi(true))
            .init(),
    }

    Ok(())
}
