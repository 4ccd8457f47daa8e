//! Log output
//!
//! Installs the global tracing subscriber from configuration. The filter
//! comes from `MCS_LOG` when set, otherwise from the configured level; a
//! level typo is a configuration error and fails boot with exit code 2
//! instead of silently swallowing output. File output runs through a
//! non-blocking daily-rolling writer whose guard the boot sequence holds
//! until shutdown.

use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use mcs_domain::error::{Error, Result};

use crate::config::{LogFormat, LoggingConfig};

/// Levels accepted in `logging.level`
const KNOWN_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Keeps the background log writer alive
///
/// Dropping the guard flushes pending lines and stops the writer thread,
/// so it must outlive everything that logs.
pub struct LogGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Install the global tracing subscriber from configuration
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let filter = resolve_filter(config)?;

    match &config.file_output {
        Some(path) => {
            let (writer, guard) = rolling_writer(path);
            install(filter, config.format, Some(writer));
            Ok(LogGuard {
                _file_writer: Some(guard),
            })
        }
        None => {
            install(filter, config.format, None);
            Ok(LogGuard { _file_writer: None })
        }
    }
}

/// Filter precedence: `MCS_LOG` directives win over the configured level
fn resolve_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(directives) = std::env::var("MCS_LOG") {
        return EnvFilter::try_new(directives)
            .map_err(|e| Error::configuration_with_source("MCS_LOG is not a valid log filter", e));
    }
    Ok(EnvFilter::new(validated_level(&config.level)?))
}

/// Check a configured level against the known set
fn validated_level(level: &str) -> Result<String> {
    let lowered = level.to_lowercase();
    if KNOWN_LEVELS.contains(&lowered.as_str()) {
        Ok(lowered)
    } else {
        Err(Error::configuration(format!(
            "unknown log level '{level}'; expected one of {}",
            KNOWN_LEVELS.join(", ")
        )))
    }
}

/// Non-blocking daily-rolling writer next to the configured path
fn rolling_writer(path: &Path) -> (NonBlocking, WorkerGuard) {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("mcs.log"));
    tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, prefix))
}

/// Build and set the subscriber, one arm per (format, file) combination
fn install(filter: EnvFilter, format: LogFormat, file: Option<NonBlocking>) {
    let base = Registry::default().with(filter);
    match (format, file) {
        (LogFormat::Json, Some(writer)) => base
            .with(fmt::layer().json().with_current_span(false))
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(writer)
                    .with_ansi(false),
            )
            .init(),
        (LogFormat::Json, None) => base
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        (LogFormat::Text, Some(writer)) => base
            .with(fmt::layer().compact())
            .with(fmt::layer().compact().with_writer(writer).with_ansi(false))
            .init(),
        (LogFormat::Text, None) => base.with(fmt::layer().compact()).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_levels_pass_case_insensitively() {
        assert_eq!(validated_level("INFO").unwrap(), "info");
        assert_eq!(validated_level("Warn").unwrap(), "warn");
    }

    #[test]
    fn level_typos_are_configuration_errors() {
        let err = validated_level("verbose").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn rolling_writer_splits_directory_and_prefix() {
        // A bare file name rolls in the working directory
        let path = Path::new("mcs.log");
        assert_eq!(
            path.parent()
                .filter(|parent| !parent.as_os_str().is_empty()),
            None
        );
        // A nested path keeps its directory
        let path = Path::new("/var/log/mcs/server.log");
        assert_eq!(path.parent(), Some(Path::new("/var/log/mcs")));
        assert_eq!(path.file_name().unwrap(), "server.log");
    }
}
