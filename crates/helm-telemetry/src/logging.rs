//! Global subscriber setup.

use crate::tracing_layer::{DiagnosticEvent, DiagnosticLayer};
use anyhow::Context as _;
use std::path::Path;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Filter used when `RUST_LOG` is unset or invalid.
///
/// Directive targets match by prefix, so this covers every `helm_*` crate.
pub const DEFAULT_FILTER: &str = "helm=info";

const LOG_FILE_PREFIX: &str = "helm.log";

/// Builds the env filter, preferring `RUST_LOG` over [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber.
///
/// Layers:
/// - stderr, human readable
/// - `<logs_dir>/helm.log.YYYY-MM-DD`, rotated daily, no ANSI
/// - [`DiagnosticLayer`] when `diagnostics` is given (WARN and above)
///
/// # Arguments
///
/// * `logs_dir` - Directory for the rolling log file, created if missing
/// * `diagnostics` - Receiver side of an in-app diagnostics panel
///
/// # Errors
///
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init_logging(
    logs_dir: &Path,
    diagnostics: Option<mpsc::UnboundedSender<DiagnosticEvent>>,
) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory '{}'", logs_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true),
        )
        .with(diagnostics.map(DiagnosticLayer::new))
        .try_init()
        .context("Failed to install global tracing subscriber")?;

    tracing::info!(
        "[Telemetry] Logging initialized, files under {}",
        logs_dir.display()
    );
    Ok(guard)
}
