//! Logger setup
//!
//! Every executable logs to stdout and to a log file in its session directory. Lines are
//! prefixed with the time since the session started and a coloured level tag, and debug or
//! trace lines also name the module they came from.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{info, Level, Record};
use std::fmt::Arguments;
use thiserror::Error;

// Internal imports
use crate::session::{self, Session};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Modules which log every drive cycle, capped at `Debug` unless a finer level was requested.
const CYCLIC_MODULES: &[&str] = &["plat_lib::drive_loop", "plat_lib::drive_ctrl"];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The minimum log level must include `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Error opening the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("A logger has already been installed: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Install the logger for this execution.
///
/// `min_level` must be `Info` or finer. Can only succeed once per process.
pub fn logger_init(
    min_level: LevelFilter,
    session: &Session
) -> Result<(), LoggerInitError> {

    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let cyclic_level = min_level.min(LevelFilter::Debug);

    let dispatch = CYCLIC_MODULES.iter().fold(
        fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!("{}", format_line(message, record)))
            })
            .level(min_level)
            .level_for("zmq", LevelFilter::Info),
        |d, module| d.level_for(*module, cyclic_level)
    );

    dispatch
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn format_line(message: &Arguments, record: &Record) -> String {
    let time_s = session::get_elapsed_seconds();
    let tag = level_tag(record.level());

    if record.level() > Level::Info {
        format!("[{:10.6} {}] {}: {}", time_s, tag, record.target(), message)
    }
    else {
        format!("[{:10.6} {}] {}", time_s, tag, message)
    }
}

/// Three letter tag of a log level
fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRC".dimmed().italic(),
        Level::Debug => "DBG".dimmed(),
        Level::Info  => "INF".normal(),
        Level::Warn  => "WRN".yellow(),
        Level::Error => "ERR".red().bold()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level_tags() {
        colored::control::set_override(false);
        assert_eq!(level_tag(Level::Warn).to_string(), "WRN");
        assert_eq!(level_tag(Level::Trace).to_string(), "TRC");
    }
}
