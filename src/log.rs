//! Logging macros prefixing messages with the simulation time and the
//! context label.
//!
//! The macros accept anything exposing `time()` and `name()`, i.e. both
//! [`Simulation`](crate::Simulation) and
//! [`ProcessContext`](crate::ProcessContext). Output goes through the [`log`]
//! facade; install any logger (e.g. `env_logger`) to see it. The kernel's own
//! suspension/resume lines are emitted at trace level under the `simproc`
//! target.

use colored::{ColoredString, Colorize};

/// Formats a simulation time for log output.
pub fn time_str(time: f64) -> ColoredString {
    format!("{:.3}", time).blue()
}

/// Logs a message at error level with simulation time and context label.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => {
        log::error!(
            "[{} {}] {}",
            $crate::log::time_str($ctx.time()),
            $ctx.name(),
            format_args!($($arg)+)
        )
    };
}

/// Logs a message at warn level with simulation time and context label.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => {
        log::warn!(
            "[{} {}] {}",
            $crate::log::time_str($ctx.time()),
            $ctx.name(),
            format_args!($($arg)+)
        )
    };
}

/// Logs a message at info level with simulation time and context label.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => {
        log::info!(
            "[{} {}] {}",
            $crate::log::time_str($ctx.time()),
            $ctx.name(),
            format_args!($($arg)+)
        )
    };
}

/// Logs a message at debug level with simulation time and context label.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => {
        log::debug!(
            "[{} {}] {}",
            $crate::log::time_str($ctx.time()),
            $ctx.name(),
            format_args!($($arg)+)
        )
    };
}

/// Logs a message at trace level with simulation time and context label.
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => {
        log::trace!(
            "[{} {}] {}",
            $crate::log::time_str($ctx.time()),
            $ctx.name(),
            format_args!($($arg)+)
        )
    };
}
