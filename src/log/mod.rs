//! Asynchronous level logging
//!
//! Records are opaque text lines prefixed by a level sigil and a cached
//! timestamp. Producers append into a shared buffer; one flusher thread
//! drains it to a size-rotated file. The usual entry points are the
//! [`dlog!`](crate::dlog), [`ilog!`](crate::ilog), [`wlog!`](crate::wlog),
//! [`elog!`](crate::elog) and [`flog!`](crate::flog) macros against the
//! process-wide logger; [`LevelLogger`] instances can also be driven
//! directly.

mod config;
mod logger;
mod signal;
mod time;

pub use config::LogConfig;
pub use logger::LevelLogger;

use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::buf::AppendBuf;
use crate::error::{Error, Result};

/// Log severity. Records below the configured minimum are dropped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Level {
    /// The single-byte marker starting every record.
    pub fn sigil(self) -> u8 {
        match self {
            Level::Debug => b'D',
            Level::Info => b'I',
            Level::Warning => b'W',
            Level::Error => b'E',
            Level::Fatal => b'F',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    /// Accepts the level name or its numeric value 0-4.
    fn from_str(s: &str) -> Result<Level> {
        match s {
            "debug" | "0" => Ok(Level::Debug),
            "info" | "1" => Ok(Level::Info),
            "warning" | "2" => Ok(Level::Warning),
            "error" | "3" => Ok(Level::Error),
            "fatal" | "4" => Ok(Level::Fatal),
            _ => Err(Error::Log(format!("invalid log level: {}", s))),
        }
    }
}

static GLOBAL: OnceLock<LevelLogger> = OnceLock::new();

/// Start the process-wide logger with `config` and install the signal
/// handlers. Fails if a logger is already running.
pub fn init(config: LogConfig) -> Result<()> {
    let lg = LevelLogger::start(config)?;
    if GLOBAL.set(lg).is_err() {
        return Err(Error::Log("logger already initialized".into()));
    }
    signal::install();
    Ok(())
}

/// The process-wide logger, started with defaults on first use.
pub fn logger() -> &'static LevelLogger {
    GLOBAL.get_or_init(|| {
        signal::install();
        LevelLogger::start(LogConfig::default()).expect("start log flusher")
    })
}

pub(crate) fn try_logger() -> Option<&'static LevelLogger> {
    GLOBAL.get()
}

/// Drain and stop the process-wide logger. Call before a normal exit.
pub fn close() {
    if let Some(lg) = GLOBAL.get() {
        lg.close();
    }
}

thread_local! {
    // Per-thread record scratch, reused across log calls.
    static RECORD: RefCell<AppendBuf> = RefCell::new(AppendBuf::new());
}

fn format_record(buf: &mut AppendBuf, level: Level, args: fmt::Arguments<'_>) {
    buf.clear();
    buf.push(level.sigil());
    // Placeholder for the 13-byte stamp; the logger overwrites it.
    buf.append(b"0000 00:00:00");
    buf.push(b' ');
    let _ = fmt::Write::write_fmt(buf, args);
    buf.push(b'\n');
}

#[doc(hidden)]
pub fn push_record(level: Level, args: fmt::Arguments<'_>) {
    let lg = logger();
    if level < lg.config().min_log_level {
        return;
    }
    RECORD.with(|cell| match cell.try_borrow_mut() {
        Ok(mut buf) => {
            format_record(&mut buf, level, args);
            lg.push(&mut buf, level);
        }
        // A Display impl in the arguments logged too; fall back to a fresh
        // buffer rather than poisoning the scratch.
        Err(_) => {
            let mut buf = AppendBuf::new();
            format_record(&mut buf, level, args);
            lg.push(&mut buf, level);
        }
    });
}

#[doc(hidden)]
pub fn fatal_record(args: fmt::Arguments<'_>) -> ! {
    let mut buf = AppendBuf::new();
    format_record(&mut buf, Level::Fatal, args);
    logger().push_fatal(&mut buf)
}

/// Log at debug level.
#[macro_export]
macro_rules! dlog {
    ($($arg:tt)*) => {
        $crate::log::push_record($crate::log::Level::Debug, format_args!($($arg)*))
    };
}

/// Log at info level.
#[macro_export]
macro_rules! ilog {
    ($($arg:tt)*) => {
        $crate::log::push_record($crate::log::Level::Info, format_args!($($arg)*))
    };
}

/// Log at warning level.
#[macro_export]
macro_rules! wlog {
    ($($arg:tt)*) => {
        $crate::log::push_record($crate::log::Level::Warning, format_args!($($arg)*))
    };
}

/// Log at error level.
#[macro_export]
macro_rules! elog {
    ($($arg:tt)*) => {
        $crate::log::push_record($crate::log::Level::Error, format_args!($($arg)*))
    };
}

/// Log at fatal level: write synchronously, dump a backtrace to
/// `<exe>.fatal`, and abort.
#[macro_export]
macro_rules! flog {
    ($($arg:tt)*) => {
        $crate::log::fatal_record(format_args!($($arg)*))
    };
}
