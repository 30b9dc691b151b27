/// Set to false to hide date in logs
const LOG_SHOW_DATE: bool = false;
/// Set to false to hide time in logs
const LOG_SHOW_TIME: bool = true;

/// Fixed column widths so multi-line output stays aligned
const TAG_WIDTH: usize = 8;
const LOG_TYPE_WIDTH: usize = 10;

use chrono::Local;
use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};

static LOGGER_READY: AtomicBool = AtomicBool::new(false);

/// Log tags for categorizing log messages.
#[derive(Debug, Clone)]
pub enum LogTag {
    Sync,
    Chain,
    Store,
    Stats,
    System,
    Other(String),
}

impl LogTag {
    fn label(&self) -> &str {
        match self {
            LogTag::Sync => "SYNC",
            LogTag::Chain => "CHAIN",
            LogTag::Store => "STORE",
            LogTag::Stats => "STATS",
            LogTag::System => "SYSTEM",
            LogTag::Other(s) => s.as_str(),
        }
    }

    fn colored_label(&self) -> ColoredString {
        let padded = format!("{:<width$}", self.label(), width = TAG_WIDTH);
        match self {
            LogTag::Sync => padded.bright_cyan().bold(),
            LogTag::Chain => padded.bright_blue().bold(),
            LogTag::Store => padded.bright_magenta().bold(),
            LogTag::Stats => padded.bright_green().bold(),
            LogTag::System => padded.bright_yellow().bold(),
            LogTag::Other(_) => padded.white().bold(),
        }
    }
}

/// Initialize the logger. Safe to call more than once.
pub fn init() {
    LOGGER_READY.store(true, Ordering::SeqCst);
}

/// Logs a message with optional date/time, tag and level.
pub fn log(tag: LogTag, log_type: &str, message: &str) {
    if !LOGGER_READY.load(Ordering::SeqCst) {
        // Logging before init still works, just unformatted
        println!("{} {}", tag.label(), message);
        return;
    }

    let now = Local::now();
    let mut prefix = String::new();
    if LOG_SHOW_DATE {
        prefix.push_str(&now.format("%Y-%m-%d ").to_string());
    }
    if LOG_SHOW_TIME {
        prefix.push_str(&now.format("%H:%M:%S ").to_string());
    }
    let prefix = if prefix.is_empty() {
        String::new()
    } else {
        prefix.dimmed().to_string()
    };

    let level = format!("{:<width$}", log_type.to_uppercase(), width = LOG_TYPE_WIDTH);
    let level_str = match log_type.to_uppercase().as_str() {
        "ERROR" => level.bright_red().bold(),
        "WARN" | "WARNING" => level.bright_yellow().bold(),
        "SUCCESS" => level.bright_green().bold(),
        "INFO" => level.bright_blue().bold(),
        "DEBUG" => level.bright_black().bold(),
        _ => level.white().bold(),
    };

    println!("{}[{}] [{}] {}", prefix, tag.colored_label(), level_str, message);
}

/// Convenience wrappers used by most call sites.
pub fn info(tag: LogTag, message: &str) {
    log(tag, "INFO", message);
}

pub fn warn(tag: LogTag, message: &str) {
    log(tag, "WARN", message);
}

pub fn error(tag: LogTag, message: &str) {
    log(tag, "ERROR", message);
}

pub fn success(tag: LogTag, message: &str) {
    log(tag, "SUCCESS", message);
}

pub fn debug(tag: LogTag, message: &str) {
    if crate::arguments::is_debug_enabled() {
        log(tag, "DEBUG", message);
    }
}
