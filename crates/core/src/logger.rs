use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use chrono::Local;

static LOGGER: OnceLock<Mutex<File>> = OnceLock::new();

/// Initialize the global logger. Clears the log file. Without init, log
/// lines still go to stderr, which is what the tests rely on.
pub fn init(log_dir: &Path) {
    fs::create_dir_all(log_dir).ok();
    let log_path = log_dir.join("autoplay.log");
    match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
    {
        Ok(file) => {
            LOGGER.set(Mutex::new(file)).ok();
        }
        Err(e) => eprintln!("failed to open log file {}: {}", log_path.display(), e),
    }
}

fn write_log(level: &str, prefix: &str, msg: &str) {
    let ts = Local::now().format("%H:%M:%S").to_string();
    let line = if prefix.is_empty() {
        format!("[{}] [{}] {}", ts, level, msg)
    } else {
        format!("[{}] [{}] [{}] {}", ts, level, prefix, msg)
    };

    eprintln!("{}", line);
    if let Some(file) = LOGGER.get() {
        if let Ok(mut f) = file.lock() {
            writeln!(f, "{}", line).ok();
        }
    }
}

pub fn info(msg: &str) {
    write_log("INFO", "", msg);
}

pub fn warn(msg: &str) {
    write_log("WARN", "", msg);
}

pub fn error(msg: &str) {
    write_log("ERROR", "", msg);
}

/// Log with a subsystem prefix ("stub", "win32", "hotkey", ...).
pub fn info_p(prefix: &str, msg: &str) {
    write_log("INFO", prefix, msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log("WARN", prefix, msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log("ERROR", prefix, msg);
}
