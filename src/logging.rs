use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::db::config::{env_bool, env_string};

const DEFAULT_LOG_FILE_NAME: &str = "tutor-backend.log";

/// Where, and whether, log lines are mirrored to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub file_logs_enabled: bool,
    pub dir: PathBuf,
    pub file_name: String,
    pub rotation: LogRotation,
}

impl LogConfig {
    /// Reads `ENABLE_FILE_LOGS`, `LOG_DIR`, `LOG_FILE_NAME` and `LOG_ROTATION`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            file_logs_enabled: env_bool("ENABLE_FILE_LOGS", defaults.file_logs_enabled),
            dir: env_string("LOG_DIR").map(PathBuf::from).unwrap_or(defaults.dir),
            file_name: env_string("LOG_FILE_NAME").unwrap_or(defaults.file_name),
            rotation: env_string("LOG_ROTATION")
                .as_deref()
                .and_then(LogRotation::parse)
                .unwrap_or(defaults.rotation),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_logs_enabled: false,
            dir: PathBuf::from("./logs"),
            file_name: DEFAULT_LOG_FILE_NAME.to_string(),
            rotation: LogRotation::Daily,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl LogRotation {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            "never" => Some(Self::Never),
            _ => None,
        }
    }

    fn to_appender(self) -> Rotation {
        match self {
            Self::Hourly => Rotation::HOURLY,
            Self::Daily => Rotation::DAILY,
            Self::Never => Rotation::NEVER,
        }
    }
}

/// Keeps the background log writer alive; dropping it flushes pending lines.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

pub fn init_tracing(log_level: &str, logging: &LogConfig) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(true);

    if logging.file_logs_enabled {
        match std::fs::create_dir_all(&logging.dir) {
            Ok(()) => {
                let file_appender = RollingFileAppender::new(
                    logging.rotation.to_appender(),
                    &logging.dir,
                    &logging.file_name,
                );
                let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
                let file_layer = fmt::layer()
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .with_target(true);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(stdout_layer)
                    .with(file_layer)
                    .init();

                return Some(FileLogGuard { _guard: guard });
            }
            // The subscriber is not up yet, so this is the only place the failure can go.
            Err(err) => eprintln!(
                "failed to create log directory {}: {err}",
                logging.dir.display()
            ),
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .init();

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_parse_is_case_insensitive() {
        assert_eq!(LogRotation::parse("Hourly"), Some(LogRotation::Hourly));
        assert_eq!(LogRotation::parse("NEVER"), Some(LogRotation::Never));
        assert_eq!(LogRotation::parse("weekly"), None);
    }

    #[test]
    fn test_defaults_keep_file_logs_off() {
        let config = LogConfig::default();
        assert!(!config.file_logs_enabled);
        assert_eq!(config.file_name, "tutor-backend.log");
        assert_eq!(config.rotation, LogRotation::Daily);
    }
}
