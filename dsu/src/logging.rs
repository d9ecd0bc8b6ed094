//! Logging setup.

use crate::config::LoggingOptions;
use dsu_shared::errors::{DsuError, DsuResult};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// File name used when a log directory is configured.
pub const LOG_FILE_NAME: &str = "dsu-install.log";

/// Keeps the non-blocking file writer flushing for the life of the process.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber.
///
/// Logs go to stderr and, when `log_dir` is set, to `log_dir/dsu-install.log`.
/// `RUST_LOG` takes precedence over the configured filter. Calling this more
/// than once leaves the first subscriber in place.
pub fn init_logging(options: &LoggingOptions) -> DsuResult<()> {
    let default_filter = options.filter.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| DsuError::Config(format!("invalid log filter: {}", e)))?;

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let file_layer = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_GUARD.set(guard);
            Some(fmt::layer().with_writer(writer).with_ansi(false))
        }
        None => None,
    };

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }

    Ok(())
}
