// rotolog - systems support library
// Asynchronous rotating level logger with a slab-allocated JSON value.

#![warn(rust_2018_idioms)]

pub mod buf;
pub mod json;
pub mod log;

// Re-exports for convenience
pub use buf::AppendBuf;
pub use json::{Kind, Value};
pub use log::{Level, LevelLogger, LogConfig};

/// rotolog error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        /// JSON parse failure. Deliberately detail-free: callers get one
        /// answer, diagnostics belong in the log.
        #[error("invalid json text")]
        InvalidJson,

        #[error("log error: {0}")]
        Log(String),

        #[error("config error: {0}")]
        Config(String),

        #[error("io error: {0}")]
        Io(#[from] std::io::Error),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

pub use error::{Error, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
