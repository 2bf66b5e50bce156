pub mod phases;

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use parking_lot::Mutex;

pub use phases::PhaseTimesMonitor;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageLevel {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
    UnrecoverableError = 4,
}

impl MessageLevel {
    pub fn label(&self) -> &'static str {
        match self {
            MessageLevel::Debug => "DEBUG",
            MessageLevel::Info => "INFO",
            MessageLevel::Warning => "WARNING",
            MessageLevel::Error => "ERROR",
            MessageLevel::UnrecoverableError => "FATAL",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "debug" => Some(MessageLevel::Debug),
            "info" => Some(MessageLevel::Info),
            "warning" | "warn" => Some(MessageLevel::Warning),
            "error" => Some(MessageLevel::Error),
            _ => None,
        }
    }
}

struct LoggingSinks {
    callback: Option<fn(MessageLevel, &str)>,
    file: Option<File>,
    min_level: MessageLevel,
}

static LOGGING_SINKS: Mutex<LoggingSinks> = Mutex::new(LoggingSinks {
    callback: None,
    file: None,
    min_level: MessageLevel::Info,
});

pub fn setup_logging_callback(callback: fn(MessageLevel, &str)) {
    LOGGING_SINKS.lock().callback = Some(callback);
}

pub fn clear_logging_callback() {
    LOGGING_SINKS.lock().callback = None;
}

/// Appends every message, regardless of the callback, to the given file
pub fn setup_logging_file(path: impl AsRef<Path>) -> std::io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;
    LOGGING_SINKS.lock().file = Some(file);
    Ok(())
}

pub fn set_min_level(level: MessageLevel) {
    LOGGING_SINKS.lock().min_level = level;
}

pub fn min_level() -> MessageLevel {
    LOGGING_SINKS.lock().min_level
}

pub fn log(level: MessageLevel, message: &str) {
    let mut sinks = LOGGING_SINKS.lock();
    if level < sinks.min_level {
        return;
    }

    if let Some(file) = &mut sinks.file {
        // A broken log file must not take down the pipeline
        let _ = writeln!(file, "[{}] {}", level.label(), message);
    }

    if let Some(callback) = sinks.callback {
        callback(level, message);
    } else {
        match level {
            MessageLevel::Warning | MessageLevel::Error | MessageLevel::UnrecoverableError => {
                eprintln!("[{}] {}", level.label(), message)
            }
            MessageLevel::Debug | MessageLevel::Info => println!("{}", message),
        }
    }
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log($crate::MessageLevel::Debug, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log($crate::MessageLevel::Info, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log($crate::MessageLevel::Warning, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log($crate::MessageLevel::Error, &format!($($arg)*));
    };
}

/// Reports the error of a result that ends the run, the result passes through
pub trait UnrecoverableErrorLogging {
    fn log_unrecoverable_error(self, context: impl Display) -> Self;
}

impl<T, E: Display> UnrecoverableErrorLogging for std::result::Result<T, E> {
    fn log_unrecoverable_error(self, context: impl Display) -> Self {
        if let Err(err) = &self {
            log(
                MessageLevel::UnrecoverableError,
                &format!("{}: {:#}", context, err),
            );
        }
        self
    }
}
