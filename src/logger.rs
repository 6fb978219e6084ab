// ============================================
// logger.rs - Logging Configuration
// ============================================
// Console output goes to stderr; stdout is
// reserved for command output.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub level: String,
    pub file_path: Option<PathBuf>,
    pub json_format: bool,
    pub with_timestamps: bool,
    pub with_caller: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            json_format: false,
            with_timestamps: true,
            with_caller: false,
        }
    }
}

impl LoggerConfig {
    pub fn from_config(logging: &LoggingConfig, file_path: Option<PathBuf>) -> Self {
        Self {
            level: logging.level.clone(),
            file_path,
            json_format: logging.json_format,
            with_timestamps: logging.timestamps,
            with_caller: logging.caller_info,
        }
    }
}

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

fn console_layer(config: &LoggerConfig) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.with_caller)
        .with_file(config.with_caller)
        .with_line_number(config.with_caller);

    match (config.json_format, config.with_timestamps) {
        (true, true) => layer.json().boxed(),
        (true, false) => layer.json().without_time().boxed(),
        (false, true) => layer.boxed(),
        (false, false) => layer.without_time().boxed(),
    }
}

fn file_layer(config: &LoggerConfig, file_path: &PathBuf) -> Result<(BoxedLayer, WorkerGuard)> {
    let dir = file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid log file path: {:?}", file_path))?;

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {:?}", dir))?;

    let file_appender = tracing_appender::rolling::daily(&dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let layer = fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_target(config.with_caller)
        .with_file(config.with_caller)
        .with_line_number(config.with_caller);

    let layer = if config.json_format {
        layer.json().boxed()
    } else {
        layer.boxed()
    };

    Ok((layer, guard))
}

/// Initialize logging system. Keep the returned guard alive for as long as
/// file logs should be flushed.
pub fn init(config: LoggerConfig) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let mut layers = vec![console_layer(&config)];
    let mut guard = None;

    if let Some(ref file_path) = config.file_path {
        let (layer, file_guard) = file_layer(&config, file_path)?;
        layers.push(layer);
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            json_format: true,
            ..LoggingConfig::default()
        };
        let config = LoggerConfig::from_config(&logging, Some(PathBuf::from("/tmp/leafdoc.log")));
        assert_eq!(config.level, "debug");
        assert!(config.json_format);
        assert!(config.with_timestamps);
        assert_eq!(config.file_path, Some(PathBuf::from("/tmp/leafdoc.log")));
    }

    fn written_logs(with_caller: bool) -> String {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggerConfig {
            with_caller,
            with_timestamps: false,
            ..LoggerConfig::default()
        };
        let (layer, guard) = file_layer(&config, &dir.path().join("leafdoc.log")).unwrap();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || tracing::info!("history pruned"));
        drop(guard);

        let mut contents = String::new();
        for entry in std::fs::read_dir(dir.path()).unwrap() {
            contents.push_str(&std::fs::read_to_string(entry.unwrap().path()).unwrap());
        }
        contents
    }

    #[test]
    fn test_caller_info_adds_file_and_line() {
        let with_caller = written_logs(true);
        assert!(with_caller.contains("history pruned"));
        assert!(with_caller.contains("logger.rs:"));

        let without_caller = written_logs(false);
        assert!(without_caller.contains("history pruned"));
        assert!(!without_caller.contains("logger.rs"));
    }
}
