//! Session log: one file per run, truncated at startup.
//!
//! Default location is `<data dir>/Wipe/wipe.log`, where the data dir is
//! `%APPDATA%` on Windows, `~/Library/Application Support` on macOS and
//! `$XDG_DATA_HOME` (or `~/.local/share`) elsewhere.
//!
//! `log_info!` / `log_warn!` / `log_err!` work from anywhere in the crate.
//! Until a log is opened they do nothing, so library callers and tests that
//! never call [`init`] get no file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG: OnceLock<Mutex<File>> = OnceLock::new();

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*));
    };
}

/// Append `[HH:MM:SS] [LEVEL] msg`. I/O errors are swallowed.
pub fn write(level: &str, msg: &str) {
    let Some(log) = LOG.get() else { return };
    if let Ok(mut file) = log.lock() {
        let _ = writeln!(file, "[{}] [{}] {}", clock(unix_secs()), level, msg);
    }
}

/// Open the log at its default location. Failure is reported on stderr and
/// leaves logging disabled.
pub fn init() {
    let path = default_path();
    if let Err(e) = init_at(&path) {
        eprintln!("[logger] could not open {}: {}", path.display(), e);
    }
}

/// Open (truncating) the log at `path` and mirror panics into it.
/// Only the first successful call takes effect.
pub fn init_at(path: &Path) -> std::io::Result<()> {
    if LOG.get().is_some() {
        return Ok(());
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut file = File::create(path)?;
    writeln!(file, "=== Wipe session started (unix {}) ===", unix_secs())?;
    writeln!(file, "Log file: {}", path.display())?;
    writeln!(file)?;

    if LOG.set(Mutex::new(file)).is_ok() {
        let prev = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            write("PANIC", &info.to_string());
            prev(info);
        }));
    }
    Ok(())
}

fn default_path() -> PathBuf {
    let var = |key: &str| std::env::var_os(key).map(PathBuf::from);
    let base = if cfg!(target_os = "windows") {
        var("APPDATA")
    } else if cfg!(target_os = "macos") {
        var("HOME").map(|h| h.join("Library").join("Application Support"))
    } else {
        var("XDG_DATA_HOME").or_else(|| var("HOME").map(|h| h.join(".local").join("share")))
    };
    base.unwrap_or_else(|| PathBuf::from(".")).join("Wipe").join("wipe.log")
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// `HH:MM:SS` (UTC) of a unix timestamp.
fn clock(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", (secs % 86_400) / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing in the unit-test binary opens the log.
    #[test]
    fn writes_before_init_are_dropped() {
        write("INFO", "nobody is listening");
        crate::log_err!("still nobody: {}", 42);
        assert!(LOG.get().is_none());
    }

    #[test]
    fn clock_wraps_at_midnight() {
        assert_eq!(clock(0), "00:00:00");
        assert_eq!(clock(86_400 + 3_661), "01:01:01");
        assert_eq!(clock(86_399), "23:59:59");
    }

    #[test]
    fn default_path_ends_in_app_folder() {
        assert!(default_path().ends_with(Path::new("Wipe").join("wipe.log")));
    }
}
