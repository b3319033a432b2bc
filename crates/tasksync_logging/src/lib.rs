#![deny(missing_docs)]
//! Shared logging utilities for the tasksync workspace.
//!
//! The core, the engine and the console all log through the `sync_*`
//! macros, which forward to the `log` facade so only the binary decides
//! where output lands. Level conventions across the workspace:
//!
//! - `error`: an observer panicked or the engine runtime could not start.
//! - `warn`: a malformed push frame was dropped or a pull failed.
//! - `info`: push connections opening, dropping and being rescheduled.
//! - `debug`: stale updates rejected by the store and messages from
//!   superseded connections.
//! - `trace`: routine teardown such as a cancelled push connection.

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! sync_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! sync_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! sync_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! sync_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! sync_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Parses a level name from configuration (`"info"`, `"DEBUG"`, ...).
///
/// Unknown names fall back to `Info`.
pub fn level_from_name(name: &str) -> log::LevelFilter {
    name.trim().parse().unwrap_or(log::LevelFilter::Info)
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Debug builds get the chatty level so reconnect traces show up.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(level_from_name("DEBUG"), log::LevelFilter::Debug);
        assert_eq!(level_from_name(" warn "), log::LevelFilter::Warn);
        assert_eq!(level_from_name("nonsense"), log::LevelFilter::Info);
    }
}
