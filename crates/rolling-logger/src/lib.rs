//! Rolling File Logger
//!
//! tracing-based logger writing to stderr and to a size-capped log file.
//! `log` records from library crates are bridged into the same subscriber.
//! The most recent lines are also kept in a circular buffer so a front end
//! can show them without reading the file back.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use tracing_subscriber::fmt::{self, format::Writer, time::FormatTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Lines kept in the in-memory ring
const RECENT_CAPACITY: usize = 500;

/// Default size at which the active log file is rotated
const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Default number of rotated files kept next to the active one
const DEFAULT_MAX_FILES: usize = 3;

static RECENT: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("log file error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to install logger: {0}")]
    Init(String),
}

/// Logger tuning
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    /// Level used when `RUST_LOG` is not set
    pub level: log::LevelFilter,
    pub max_file_bytes: u64,
    pub max_files: usize,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            level: log::LevelFilter::Info,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

/// Initialize logging into `log_dir/<app_name>.log` with default options
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), LoggerError> {
    init_logger_with(log_dir, app_name, LoggerOptions::default())
}

/// Initialize logging with explicit options.
///
/// Fails if a global subscriber is already installed.
pub fn init_logger_with(
    log_dir: impl AsRef<Path>,
    app_name: &str,
    options: LoggerOptions,
) -> Result<(), LoggerError> {
    let file = RollingFile::open(
        log_dir.as_ref(),
        app_name,
        options.max_file_bytes,
        options.max_files,
    )?;
    let path = file.path();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.level.to_string().to_lowercase()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_timer(LocalTime).with_writer(io::stderr))
        .with(
            fmt::layer()
                .with_timer(LocalTime)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| LoggerError::Init(e.to_string()))?;

    tracing::info!(path = %path.display(), "Logging to file");
    Ok(())
}

/// Snapshot of the most recent log lines, oldest first
pub fn recent_lines() -> Vec<String> {
    lock_recent().iter().cloned().collect()
}

fn lock_recent() -> std::sync::MutexGuard<'static, VecDeque<String>> {
    let ring = RECENT.get_or_init(|| Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY)));
    // poisoned only if a writer panicked mid-push
    ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn remember(buf: &[u8]) {
    let text = String::from_utf8_lossy(buf);
    let mut ring = lock_recent();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        if ring.len() == RECENT_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(line.to_string());
    }
}

/// Local wall-clock timestamps, millisecond precision
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Append-only log file that rotates once it grows past `max_bytes`.
///
/// Rotation shifts `<name>.log.N` to `<name>.log.N+1`, dropping anything past
/// `max_files`, then moves the active file to `<name>.log.1`.
pub struct RollingFile {
    dir: PathBuf,
    base_name: String,
    max_bytes: u64,
    max_files: usize,
    file: File,
    written: u64,
}

impl RollingFile {
    pub fn open(
        dir: impl Into<PathBuf>,
        base_name: &str,
        max_bytes: u64,
        max_files: usize,
    ) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.log", base_name));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            dir,
            base_name: base_name.to_string(),
            max_bytes,
            max_files,
            file,
            written,
        })
    }

    /// Path of the active log file
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.base_name))
    }

    fn rotated_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.base_name, n))
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.max_files == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(self.path())?;
            self.written = 0;
            return Ok(());
        }

        let oldest = self.rotated_path(self.max_files);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..self.max_files).rev() {
            let from = self.rotated_path(n);
            if from.exists() {
                fs::rename(&from, self.rotated_path(n + 1))?;
            }
        }
        fs::rename(self.path(), self.rotated_path(1))?;

        self.file = OpenOptions::new().create(true).append(true).open(self.path())?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        remember(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
