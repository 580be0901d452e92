//! Logger module
//!
//! Sets up the `tracing` subscriber and provides the lifecycle and access
//! log helpers used by the server:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Optional file output through a non-blocking writer

mod format;

pub use format::AccessLogEntry;

use crate::config::{Config, LogFormat, LoggingConfig};
use std::fs::{File, OpenOptions};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Target used for access log lines, filterable with `RUST_LOG=access=off`
pub const ACCESS_TARGET: &str = "access";

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid log level filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to open log file '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Logger already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Initialize the global subscriber
///
/// Should be called once at application startup. `RUST_LOG` takes
/// precedence over `logging.level`. The returned guard must be held for as
/// long as file logging is needed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggerError> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let (writer, guard) = match config.log_file.as_deref() {
        Some(path) => {
            let file = open_log_file(path).map_err(|source| LoggerError::File {
                path: path.to_string(),
                source,
            })?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(config.log_file.is_none())
        .with_writer(writer);
    let fmt_layer = match config.format {
        LogFormat::Full => fmt_layer.boxed(),
        LogFormat::Compact => fmt_layer.compact().boxed(),
        LogFormat::Json => fmt_layer.json().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(guard)
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> std::io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!("======================================");
    tracing::info!("Axilla server started");
    tracing::info!("Listening on: http://{addr}");
    tracing::info!("Renderer: {}", config.renderer.command().display());
    tracing::info!("Assets: {}", config.renderer.assets_dir);
    tracing::info!("Temp dir: {}", config.renderer.temp_dir().display());
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    if let Some(ref path) = config.logging.log_file {
        tracing::info!("Log file: {path}");
    }
    tracing::info!("======================================");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!(%peer_addr, "connection accepted");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::warn!("Failed to serve connection: {err:?}");
}

pub fn log_shutdown(active_connections: usize) {
    tracing::info!(active_connections, "shutdown requested, no longer accepting connections");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: ACCESS_TARGET, "{}", entry.format(format));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_log_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/nested/axilla.log");
        open_log_file(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
    }
}
