use once_cell::sync::OnceCell;
use std::fs::OpenOptions;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Keeps the background log writer alive for the process lifetime; also
/// marks logging as installed.
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Route `tracing` output to an append-only file. Only the first call
/// installs a subscriber; `RUST_LOG` overrides `default_filter`. Logging is
/// best-effort: the engine runs fine when the file cannot be opened.
pub fn init_logging(path: impl AsRef<Path>, default_filter: &str) {
    let _ = try_init(path.as_ref(), default_filter);
}

fn try_init(path: &Path, default_filter: &str) -> std::io::Result<()> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer)
        .finish();

    // lose the race gracefully when a test harness installed one already
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        let _ = LOG_GUARD.set(guard);
    }
    Ok(())
}
