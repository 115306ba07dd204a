//! Diagnostic logging for kcsh
//!
//! The shell owns the terminal, so diagnostics go to a log file by default
//! and never interleave with the prompt. Stderr output is only used when
//! explicitly requested.

use std::path::{Path, PathBuf};

pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ConfigErrorKind, ShellError, ShellResult};

/// Environment variable overriding the configured filter
pub const LOG_ENV: &str = "KCSH_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    File(PathBuf),
    Stderr,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub output: LogOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: default_log_path().map_or(LogOutput::Disabled, LogOutput::File),
        }
    }
}

/// `<data dir>/kcsh/kcsh.log`
pub fn default_log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("kcsh").join("kcsh.log"))
}

/// Build the filter, preferring `KCSH_LOG` over the configured level
pub fn build_filter(level: &str, env_override: Option<&str>) -> ShellResult<EnvFilter> {
    if let Some(directive) = env_override.filter(|d| !d.trim().is_empty()) {
        if let Ok(filter) = EnvFilter::try_new(directive) {
            return Ok(filter);
        }
    }
    EnvFilter::try_new(level).map_err(|e| {
        ShellError::config(
            ConfigErrorKind::InvalidValue,
            format!("invalid log level '{level}': {e}"),
        )
    })
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for the lifetime of the process. Installing twice is not an error; the
/// first subscriber stays in place.
pub fn init(config: &LoggingConfig) -> ShellResult<Option<WorkerGuard>> {
    let env = std::env::var(LOG_ENV).ok();
    init_with(config, env.as_deref())
}

/// [`init`] with an explicit override in place of `KCSH_LOG`
pub fn init_with(config: &LoggingConfig, env_override: Option<&str>) -> ShellResult<Option<WorkerGuard>> {
    let filter = build_filter(&config.level, env_override)?;

    match &config.output {
        LogOutput::Disabled => Ok(None),
        LogOutput::Stderr => {
            let layer = fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_ansi(false);
            let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
            Ok(None)
        }
        LogOutput::File(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .compact()
                .with_writer(writer)
                .with_ansi(false);
            let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
            Ok(Some(guard))
        }
    }
}

fn file_writer(path: &Path) -> ShellResult<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| {
            ShellError::config(
                ConfigErrorKind::InvalidValue,
                format!("log file has no name: {}", path.display()),
            )
        })?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins_over_level() {
        let filter = build_filter("warn", Some("kcsh_core=trace")).unwrap();
        assert!(filter.to_string().contains("kcsh_core=trace"));
    }

    #[test]
    fn invalid_override_falls_back_to_level() {
        let filter = build_filter("info", Some("kcsh=loud")).unwrap();
        assert!(filter.to_string().contains("info"));
    }

    #[test]
    fn invalid_level_is_a_config_error() {
        assert!(build_filter("kcsh=loud", None).is_err());
    }

    #[test]
    fn file_output_creates_the_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kcsh.log");
        let config = LoggingConfig {
            level: "debug".to_string(),
            output: LogOutput::File(path.clone()),
        };
        let guard = init(&config).unwrap();
        assert!(guard.is_some());
        assert!(path.parent().unwrap().is_dir());
    }
}
