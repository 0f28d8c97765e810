//! Logging setup
//!
//! Console output is `pretty` or `json`; with `log_dir` set, a daily rolling
//! JSON file is written as well. Filtering follows `RUST_LOG`, defaulting to
//! `enrollment=info`.

use crate::settings::{LogFormat, Settings};
use crate::telemetry;
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

const DEFAULT_FILTER: &str = "enrollment=info";
const LOG_FILE_PREFIX: &str = "enrollment-engine.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the file writer flushing until dropped
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

pub fn init(settings: &Settings) -> Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    match settings.log_format {
        // Production: JSON structured logging
        LogFormat::Json => layers.push(fmt::layer().json().boxed()),
        // Development: Pretty formatting with colors
        LogFormat::Pretty => layers.push(fmt::layer().pretty().boxed()),
    }

    let mut file_guard = None;
    if let Some(dir) = settings.log_dir() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
        file_guard = Some(guard);
    }

    if let Some(otel) = telemetry::layer()? {
        layers.push(otel);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggingGuard { _file: file_guard })
}
