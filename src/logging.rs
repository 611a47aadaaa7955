//! Logging setup.
//!
//! Events always go to stderr. When a log directory is configured they are
//! also written to a daily rolling file there.
//!
//! Log level is controlled via the `SWAN_LOG` environment variable:
//! - `SWAN_LOG=debug` for per-purpose and per-query detail
//! - `SWAN_LOG=info` for build progress (default)
//! - `SWAN_LOG=warn` for skipped files and errors only

use anyhow::Result;
use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "SWAN_LOG";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the logging system. Call once at startup.
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(stderr_layer)
            .try_init()?;
        return Ok(());
    };

    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "swan-db.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes the file writer when dropped, so it lives as long as the process.
    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(stderr_layer)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    tracing::info!("Logging to {}", log_dir.display());
    Ok(())
}
