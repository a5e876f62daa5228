use std::path::Path;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the non-blocking writers flushing; hold it for the life of the process.
pub struct LogGuard {
    _file: WorkerGuard,
    _console: WorkerGuard,
}

pub fn init_logging(log_dir: &str, service_name: &str) -> Result<LogGuard, anyhow::Error> {
    // Create log directory if it doesn't exist
    std::fs::create_dir_all(log_dir)?;

    // Rotate logs on startup
    let rotation = rotate_logs_on_startup(log_dir, service_name);

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(log_dir, format!("{service_name}.log"));
    let (non_blocking_file, file_guard) = non_blocking(file_appender);

    // Console goes to stderr so CLI subcommands can keep stdout for JSON.
    let (non_blocking_console, console_guard) = non_blocking(std::io::stderr());

    // Create layers
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false) // No colors in file logs
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(non_blocking_console)
        .with_ansi(true) // Colors for console
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false);

    // Set up environment filter (can be controlled via RUST_LOG env var)
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    info!(
        "Logging initialized - logs will be written to {}",
        current_log_file(log_dir, service_name)
    );
    match rotation {
        Ok(Some(backup_file)) => info!("Previous log file backed up to: {backup_file}"),
        Ok(None) => {}
        Err(e) => warn!("Could not back up previous log file: {e}"),
    }

    Ok(LogGuard {
        _file: file_guard,
        _console: console_guard,
    })
}

/// The file the daily appender writes today (it rolls on the UTC date).
pub fn current_log_file(log_dir: &str, service_name: &str) -> String {
    let date = chrono::Utc::now().format("%Y-%m-%d");
    format!("{log_dir}/{service_name}.log.{date}")
}

/// Moves today's log aside so each run starts a fresh file. Returns the
/// backup path, or `None` when there was nothing to move.
pub fn rotate_logs_on_startup(
    log_dir: &str,
    service_name: &str,
) -> Result<Option<String>, anyhow::Error> {
    let log_file = current_log_file(log_dir, service_name);

    if !Path::new(&log_file).exists() {
        return Ok(None);
    }

    // Create backup with timestamp
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let backup_file = format!("{log_dir}/{service_name}.{timestamp}.log");

    std::fs::rename(&log_file, &backup_file)?;
    Ok(Some(backup_file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_moves_todays_log() {
        let dir = std::env::temp_dir().join(format!("vpsman-logs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let log_dir = dir.to_str().unwrap();

        assert_eq!(rotate_logs_on_startup(log_dir, "svc").unwrap(), None);

        let today = current_log_file(log_dir, "svc");
        std::fs::write(&today, "previous run\n").unwrap();

        let backup = rotate_logs_on_startup(log_dir, "svc").unwrap().unwrap();
        assert!(!Path::new(&today).exists());
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "previous run\n");
        assert!(backup.starts_with(&format!("{log_dir}/svc.")));
        assert!(backup.ends_with(".log"));

        assert_eq!(rotate_logs_on_startup(log_dir, "svc").unwrap(), None);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
