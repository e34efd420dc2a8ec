//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence; without it the server logs its own crates at
//! debug and everything else at the subscriber default.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogConfig, LogFormat};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "folio_api=debug,folio_core=debug,tower_http=debug";

/// Install the global subscriber.
///
/// Returns the appender guard when logging to a file; keep it alive for the
/// lifetime of the process or buffered lines are lost on exit.
pub fn init_tracing(config: &LogConfig) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = config.file {
        let file_dir = path.parent().unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("folio-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        match config.format {
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init(),
            LogFormat::Text => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        // no ANSI in files unless forced
                        .with_ansi(config.ansi.unwrap_or(false)),
                )
                .init(),
        }
        Some(guard)
    } else {
        match config.format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json())
                .init(),
            LogFormat::Text => {
                let mut layer = tracing_subscriber::fmt::layer();
                if let Some(ansi) = config.ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
        }
        None
    };

    tracing::info!(
        log_format = ?config.format,
        log_file = config
            .file
            .as_deref()
            .and_then(|p| p.to_str())
            .unwrap_or("(stdout)"),
        "Logging initialized"
    );

    guard
}
