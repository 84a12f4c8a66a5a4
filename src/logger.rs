//! Engine log: one plain-text file per process run.
//!
//! `init()` opens `pixelforge.log` fresh, so the file only ever holds the
//! current run. The directory is `$PIXELFORGE_LOG_DIR` when set, else the
//! platform data directory under `PixelForge/`.
//!
//! Selection, preset, crop and history code log through `log_info!`,
//! `log_warn!` and `log_err!`. Without `init()` those calls do nothing, which
//! is what library users and unit tests get.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Environment variable overriding the log directory.
pub const LOG_DIR_ENV: &str = "PIXELFORGE_LOG_DIR";
const LOG_FILE_NAME: &str = "pixelforge.log";

struct Sink {
    path: PathBuf,
    file: Mutex<File>,
}

static SINK: OnceLock<Sink> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        };
        f.write_str(tag)
    }
}

/// Path of the open log file, if `init()` succeeded.
pub fn log_path() -> Option<&'static Path> {
    SINK.get().map(|s| s.path.as_path())
}

fn append(line: &str) {
    if let Some(sink) = SINK.get()
        && let Ok(mut file) = sink.file.lock()
    {
        // A failed log write never fails the edit that triggered it.
        let _ = writeln!(file, "{}", line);
    }
}

fn format_entry(clock: &str, level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", clock, level, msg)
}

/// Append one entry. Called by the `log_*` macros.
pub fn write(level: Level, msg: &str) {
    if SINK.get().is_none() {
        return;
    }
    append(&format_entry(&timestamp(), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Open the log file and chain a panic hook that records the panic first.
/// Later calls are ignored.
pub fn init() {
    if SINK.get().is_some() {
        return;
    }
    let path = log_file_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = match OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] cannot open {}: {}", path.display(), e);
            return;
        }
    };
    let _ = SINK.set(Sink { path: path.clone(), file: Mutex::new(file) });

    append(&format!("=== PixelForge {} run at {} ===", env!("CARGO_PKG_VERSION"), human_timestamp()));
    append(&format!("log: {}", path.display()));

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        append(&format_entry(&timestamp(), Level::Panic, &info.to_string()));
        prev(info);
    }));
}

fn log_file_path() -> PathBuf {
    match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir).join(LOG_FILE_NAME),
        _ => data_dir().join("PixelForge").join(LOG_FILE_NAME),
    }
}

/// Per-user data directory, without the application folder.
fn data_dir() -> PathBuf {
    let env_path = |key: &str| std::env::var_os(key).map(PathBuf::from);

    #[cfg(target_os = "windows")]
    if let Some(appdata) = env_path("APPDATA") {
        return appdata;
    }
    #[cfg(target_os = "macos")]
    if let Some(home) = env_path("HOME") {
        return home.join("Library").join("Application Support");
    }
    env_path("XDG_DATA_HOME")
        .or_else(|| env_path("HOME").map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format_clock(d.as_secs()),
        Err(_) => "??:??:??".to_string(),
    }
}

/// UTC wall clock `HH:MM:SS` for a unix time.
fn format_clock(secs: u64) -> String {
    let day = secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, (day % 3600) / 60, day % 60)
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("unix {}", d.as_secs()),
        Err(_) => "unknown time".to_string(),
    }
}
