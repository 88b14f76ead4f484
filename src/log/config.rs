//! Logger configuration
//!
//! A plain record populated by the embedding application (flags, a config
//! file, or code). Out-of-range values clamp to their documented floors
//! instead of being rejected.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::Level;

/// Asynchronous logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for log files; created if missing.
    pub log_dir: PathBuf,
    /// Base file name. Empty means the executable name plus `.log`.
    pub log_file_name: String,
    /// Records below this level are dropped by the producer.
    pub min_log_level: Level,
    /// Size at which the active file is closed; the next open rotates.
    /// Floor 1.
    pub max_log_file_size: u64,
    /// Files retained: the base plus `.1` .. `.N-1`. Floor 1.
    pub max_log_file_num: u32,
    /// Soft cap on the ingest buffer. Floor 1 MiB.
    pub max_log_buffer_size: usize,
    /// Also write flushed output to stderr.
    pub cout: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_file_name: String::new(),
            min_log_level: Level::Debug,
            max_log_file_size: 256 << 20,
            max_log_file_num: 8,
            max_log_buffer_size: 32 << 20,
            cout: false,
        }
    }
}

impl LogConfig {
    /// Clamp out-of-range values to their floors.
    pub fn normalized(mut self) -> Self {
        self.max_log_file_size = self.max_log_file_size.max(1);
        self.max_log_file_num = self.max_log_file_num.max(1);
        self.max_log_buffer_size = self.max_log_buffer_size.max(1 << 20);
        self
    }
}
