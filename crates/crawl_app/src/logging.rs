//! Logger setup for the `crawl` binary.
//!
//! Log lines carry the run clock (`T<seconds>`) from the `crawl_*` macros, so
//! simplelog's own wall-clock timestamp is switched off.

use std::fs::File;
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOG_FILE: &str = "./crawl.log";

/// Destination for log output.
pub enum LogDestination {
    /// Write to stderr.
    Terminal,
    /// Write to the terminal and to ./crawl.log.
    Both,
}

pub fn initialize(destination: LogDestination, level: LevelFilter) {
    crawl_logging::start_run_clock();
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let LogDestination::Both = destination {
        if let Some(file_logger) = create_file_logger(level, config, Path::new(LOG_FILE)) {
            loggers.push(file_logger);
        }
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Error)
        // Only our own crates; hyper and reqwest are chatty at debug level.
        .add_filter_allow_str("crawl")
        .build()
}

fn create_file_logger(level: LevelFilter, config: Config, path: &Path) -> Option<Box<WriteLogger<File>>> {
    match File::create(path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", path, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logger_is_created_in_writable_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("crawl.log");
        assert!(create_file_logger(LevelFilter::Info, build_config(), &path).is_some());
        assert!(path.exists());
    }

    #[test]
    fn missing_dir_yields_no_file_logger() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("missing").join("crawl.log");
        assert!(create_file_logger(LevelFilter::Info, build_config(), &path).is_none());
    }
}
