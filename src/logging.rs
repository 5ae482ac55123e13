use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes the logging system with console output and, when a log
/// directory is configured, a daily-rotated JSON file.
///
/// The returned guard must be held until the process exits so buffered
/// file output is flushed.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let default_directive = format!("film_fusion={}", config.level.to_lowercase());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let Some(directory) = &config.directory else {
        install(
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stdout))
                .try_init(),
        );
        return None;
    };

    // Fall back to console-only logging if the directory can't be made
    if let Err(e) = fs::create_dir_all(directory) {
        eprintln!("Could not create log directory {}: {}", directory.display(), e);
        install(
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stdout))
                .try_init(),
        );
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(directory, &config.file_name);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    install(
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(non_blocking_writer))
            .with(fmt::layer().with_writer(std::io::stdout))
            .try_init(),
    );

    Some(guard)
}

fn install(result: Result<(), tracing_subscriber::util::TryInitError>) {
    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}
