//! Logging infrastructure for perfmon
//!
//! Everything at or above the configured level goes to a daily rolling file
//! at `~/.local/state/perfmon/perfmon.log`. Error lines emitted by the
//! collector (those carrying the `component` field) are also echoed to
//! stderr, so failed deliveries are visible without tailing the file.

use crate::collector::COMPONENT_FIELD;
use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use tracing::{Level, Metadata, Subscriber};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "perfmon.log");
    // Host request threads never wait on file IO
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(&config.level))
            .map_err(|e| Error::Config(format!("invalid logging.level: {}", e)))?,
    };

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(collector_errors(std::io::stderr))
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Keep dependencies (hyper, reqwest, ...) at warn, our crates at `level`
fn filter_directives(level: &str) -> String {
    format!("warn,perfmon={}", level)
}

/// Layer echoing collector error lines to `writer`
fn collector_errors<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .with_filter(filter_fn(is_collector_error))
}

fn is_collector_error(meta: &Metadata<'_>) -> bool {
    *meta.level() == Level::ERROR && meta.fields().field(COMPONENT_FIELD).is_some()
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}
