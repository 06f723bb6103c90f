#![deny(missing_docs)]
//! Shared logging utilities for the harvester workspace.
//!
//! This crate provides the `harvest_*` logging macros used across the codebase,
//! the logger initialisation used by the binary, and a minimal test initializer
//! for the global logger.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

#[doc(hidden)]
pub use log as __log;

/// Listing page currently being harvested. Zero means "no page yet".
static CURRENT_PAGE: AtomicU32 = AtomicU32::new(0);

/// Sets the listing page that subsequent log lines are attributed to.
/// The orchestrator calls this once per page.
pub fn set_current_page(page: u32) {
    CURRENT_PAGE.store(page, Ordering::Relaxed);
}

/// Retrieves the listing page log lines are attributed to.
/// Returns 0 if no page has been set.
pub fn current_page() -> u32 {
    CURRENT_PAGE.load(Ordering::Relaxed)
}

#[doc(hidden)]
#[macro_export]
macro_rules! __harvest_log {
    ($level:ident, $($arg:tt)*) => {{
        match $crate::current_page() {
            0 => $crate::__log::$level!($($arg)*),
            page => $crate::__log::$level!("[page {}] {}", page, format_args!($($arg)*)),
        }
    }};
}

/// Logs a trace-level message, prefixed with the current page when known.
#[macro_export]
macro_rules! harvest_trace {
    ($($arg:tt)*) => { $crate::__harvest_log!(trace, $($arg)*) };
}

/// Logs a debug-level message, prefixed with the current page when known.
#[macro_export]
macro_rules! harvest_debug {
    ($($arg:tt)*) => { $crate::__harvest_log!(debug, $($arg)*) };
}

/// Logs an info-level message, prefixed with the current page when known.
#[macro_export]
macro_rules! harvest_info {
    ($($arg:tt)*) => { $crate::__harvest_log!(info, $($arg)*) };
}

/// Logs a warn-level message, prefixed with the current page when known.
#[macro_export]
macro_rules! harvest_warn {
    ($($arg:tt)*) => { $crate::__harvest_log!(warn, $($arg)*) };
}

/// Logs an error-level message, prefixed with the current page when known.
#[macro_export]
macro_rules! harvest_error {
    ($($arg:tt)*) => { $crate::__harvest_log!(error, $($arg)*) };
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Write to the log file only.
    File,
    /// Write to terminal (stderr/stdout mixed).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

/// Initialize the global logger.
///
/// For `LogDestination::File` or `Both`, creates (truncates) the file at
/// `log_path`. If the file cannot be created, a warning is printed and only
/// the terminal logger is installed (for `Both`) or nothing (for `File`).
pub fn initialize(destination: LogDestination, level: LevelFilter, log_path: &Path) {
    let config = build_config();

    let loggers: Vec<Box<dyn SharedLogger>> = match destination {
        LogDestination::File => match create_file_logger(level, config, log_path) {
            Some(file_logger) => vec![file_logger],
            None => return,
        },
        LogDestination::Terminal => vec![term_logger(level, config)],
        LogDestination::Both => {
            let mut loggers: Vec<Box<dyn SharedLogger>> =
                vec![term_logger(level, config.clone())];
            if let Some(file_logger) = create_file_logger(level, config, log_path) {
                loggers.push(file_logger);
            }
            loggers
        }
    };

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn term_logger(level: LevelFilter, config: Config) -> Box<TermLogger> {
    TermLogger::new(level, config, TerminalMode::Mixed, ColorChoice::Auto)
}

fn create_file_logger(
    level: LevelFilter,
    config: Config,
    log_path: &Path,
) -> Option<Box<WriteLogger<File>>> {
    match File::create(log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![term_logger(level, Config::default())]);
}
