use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

fn default_directive(level: &str) -> String {
    format!("repack_watcher={}", level.trim().to_lowercase())
}

/// `RUST_LOG` wins over the configured level when set.
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(&config.level)))
}

/// Installs the global subscriber: console output plus, when a directory is
/// configured, a daily-rotated log file.
///
/// Keep the returned guard alive until shutdown or buffered file lines are lost.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let console = fmt::layer().with_target(false);

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_ansi(false).with_writer(writer);

            // A second initialization (tests) keeps the first subscriber
            let _ = tracing_subscriber::registry()
                .with(env_filter(config))
                .with(console)
                .with(file)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(env_filter(config))
                .with(console)
                .try_init();
            None
        }
    }
}
