use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the tracing subscriber. Console output always; a daily
/// rolling log file only when `CURIO_LOG_DIR` is set. The returned guard
/// must be held for the process lifetime so buffered file logs flush.
pub fn init(debug: bool) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            let level = std::env::var("CURIO_LOG_LEVEL")
                .unwrap_or_else(|_| default_level.to_string());
            EnvFilter::try_new(level)
        })
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let Ok(log_dir) = std::env::var("CURIO_LOG_DIR") else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().without_time().with_target(false))
            .try_init()?;
        return Ok(None);
    };

    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "curio.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().without_time().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_target(true),
        )
        .try_init()?;

    Ok(Some(guard))
}
