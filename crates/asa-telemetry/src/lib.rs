//! Tracing setup for the relay binaries.

pub mod error_log;

pub use error_log::{ErrorLogLayer, ErrorLogRecord, spawn_writer};

use anyhow::Context as _;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_FILTER: &str = "info";
const ROLLING_FILE_PREFIX: &str = "asa-relay.log";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Directory for the daily rolling log. `None` logs to stdout only.
    pub log_dir: Option<PathBuf>,
    /// Target of the operator error log. `None` disables it.
    pub error_log: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_FILTER.to_string(),
            log_dir: None,
            error_log: None,
        }
    }
}

/// Keeps background log writers alive. Drop it on shutdown.
pub struct TelemetryGuard {
    _file_guard: Option<WorkerGuard>,
    error_log_writer: Option<JoinHandle<()>>,
}

impl TelemetryGuard {
    pub fn error_log_writer(&self) -> Option<&JoinHandle<()>> {
        self.error_log_writer.as_ref()
    }
}

/// Installs the global subscriber: stdout, optional rolling file, and the
/// error log layer. Must be called inside a tokio runtime when an error log
/// path is set.
pub fn init_tracing(config: TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_filter))
    };

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(env_filter());

    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, ROLLING_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(env_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let (error_layer, error_log_writer) = match &config.error_log {
        Some(path) => {
            let (layer, receiver) = ErrorLogLayer::channel();
            (Some(layer), Some(spawn_writer(path.clone(), receiver)))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(error_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(TelemetryGuard {
        _file_guard: file_guard,
        error_log_writer,
    })
}
