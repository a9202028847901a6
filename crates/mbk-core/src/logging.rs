//! Logging init: progress on stderr plus two files under the XDG state dir,
//! or graceful fallback to stderr only.
//!
//! - stderr: INFO and up (overridable with `RUST_LOG`)
//! - `backup_details.log`: same events as stderr
//! - `error_log.txt`: WARN and up, the detailed failure trace

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const DETAILS_LOG: &str = "backup_details.log";
pub const ERROR_LOG: &str = "error_log.txt";

const DEFAULT_FILTER: &str = "info";

/// Writer that is either a file or stderr (used when file clone fails).
enum FileOrStderr {
    File(fs::File),
    Stderr,
}

impl io::Write for FileOrStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileOrStderr::File(f) => f.write(buf),
            FileOrStderr::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileOrStderr::File(f) => f.flush(),
            FileOrStderr::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct FileMakeWriter(fs::File);

impl<'a> MakeWriter<'a> for FileMakeWriter {
    type Writer = FileOrStderr;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(FileOrStderr::File)
            .unwrap_or(FileOrStderr::Stderr)
    }
}

/// Where a run's log files went.
#[derive(Debug, Clone)]
pub struct LogFiles {
    pub details: PathBuf,
    pub errors: PathBuf,
}

/// `~/.local/state/mbk`.
pub fn default_log_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mbk")?;
    Ok(xdg_dirs.get_state_home().join("mbk"))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn truncated(path: &Path) -> Result<BoxMakeWriter> {
    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    Ok(BoxMakeWriter::new(FileMakeWriter(file)))
}

/// Install the global subscriber writing to stderr and to fresh log files in
/// `log_dir`. On failure (e.g. log dir unwritable), returns Err so the caller
/// can fall back to [`init_logging_stderr`].
pub fn init_logging(log_dir: &Path) -> Result<LogFiles> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("create log dir {}", log_dir.display()))?;
    let files = LogFiles {
        details: log_dir.join(DETAILS_LOG),
        errors: log_dir.join(ERROR_LOG),
    };

    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_filter(env_filter());
    let details = tracing_subscriber::fmt::layer()
        .with_writer(truncated(&files.details)?)
        .with_ansi(false)
        .with_thread_names(true)
        .with_filter(env_filter());
    let errors = tracing_subscriber::fmt::layer()
        .with_writer(truncated(&files.errors)?)
        .with_ansi(false)
        .with_thread_names(true)
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(console)
        .with(details)
        .with(errors)
        .try_init()
        .context("install log subscriber")?;

    tracing::info!(
        details = %files.details.display(),
        errors = %files.errors.display(),
        "mbk logging initialized"
    );
    Ok(files)
}

/// Initialize logging to stderr only (no file). Use when init_logging() fails so the CLI doesn't crash.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}
