#![deny(missing_docs)]
//! Shared logging utilities for the crawl workspace.
//!
//! This crate provides the `crawl_*` logging macros used across the codebase,
//! a process-wide run clock that log lines are stamped with, and a minimal
//! test initializer for the global logger.

use std::sync::OnceLock;
use std::time::Instant;

#[doc(hidden)]
pub use log;

static RUN_CLOCK: OnceLock<Instant> = OnceLock::new();

/// Starts the run clock. Calling it again keeps the first start time.
pub fn start_run_clock() {
    RUN_CLOCK.get_or_init(Instant::now);
}

/// Seconds elapsed since [`start_run_clock`] was first called.
/// Starts the clock on first use if nobody did so explicitly.
pub fn run_clock() -> f64 {
    RUN_CLOCK.get_or_init(Instant::now).elapsed().as_secs_f64()
}

/// Logs a trace-level message stamped with the run clock.
#[macro_export]
macro_rules! crawl_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!("T{:.6} {}", $crate::run_clock(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message stamped with the run clock.
#[macro_export]
macro_rules! crawl_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!("T{:.6} {}", $crate::run_clock(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message stamped with the run clock.
#[macro_export]
macro_rules! crawl_info {
    ($($arg:tt)*) => {{
        $crate::log::info!("T{:.6} {}", $crate::run_clock(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message stamped with the run clock.
#[macro_export]
macro_rules! crawl_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!("T{:.6} {}", $crate::run_clock(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message stamped with the run clock.
#[macro_export]
macro_rules! crawl_error {
    ($($arg:tt)*) => {{
        $crate::log::error!("T{:.6} {}", $crate::run_clock(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    start_run_clock();

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
