//! rotolog demo binary
//!
//! Populates the logger configuration from flags or environment variables
//! and writes a batch of records, showing the intended embedding:
//! configure, init, log, close.
//!
//! # Examples
//!
//! ```bash
//! # Write 1000 records into ./logs, echoing to stderr
//! rotolog --count 1000 --cout
//!
//! # Small files to watch the rotation ladder
//! rotolog --log-dir /tmp/demo --max-log-file-size 4096 --max-log-file-num 3
//! ```

use std::path::PathBuf;

use clap::Parser;

use rotolog::log::{self, Level, LogConfig};
use rotolog::{dlog, elog, ilog, wlog, Value};

/// Demo driver for the asynchronous level logger.
#[derive(Parser, Debug)]
#[command(name = "rotolog")]
#[command(version = rotolog::VERSION)]
#[command(about = "Asynchronous rotating logger demo", long_about = None)]
struct Cli {
    /// Log directory, created if missing
    #[arg(long, default_value = "logs", env = "ROTOLOG_LOG_DIR")]
    log_dir: PathBuf,

    /// Log file name; the executable name when empty
    #[arg(long, default_value = "", env = "ROTOLOG_LOG_FILE_NAME")]
    log_file_name: String,

    /// Minimum level written: debug|info|warning|error|fatal or 0-4
    #[arg(long, default_value = "debug", env = "ROTOLOG_MIN_LOG_LEVEL")]
    min_log_level: Level,

    /// Max size of one log file in bytes
    #[arg(long, default_value_t = 256 << 20)]
    max_log_file_size: u64,

    /// Max number of log files kept
    #[arg(long, default_value_t = 8)]
    max_log_file_num: u32,

    /// Soft cap on the in-memory log buffer in bytes
    #[arg(long, default_value_t = 32 << 20)]
    max_log_buffer_size: usize,

    /// Also write log output to stderr
    #[arg(long)]
    cout: bool,

    /// Records to write
    #[arg(long, default_value_t = 100)]
    count: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    log::init(LogConfig {
        log_dir: cli.log_dir,
        log_file_name: cli.log_file_name,
        min_log_level: cli.min_log_level,
        max_log_file_size: cli.max_log_file_size,
        max_log_file_num: cli.max_log_file_num,
        max_log_buffer_size: cli.max_log_buffer_size,
        cout: cli.cout,
    })?;

    ilog!("rotolog {} starting, {} records", rotolog::VERSION, cli.count);

    for seq in 0..cli.count {
        let mut doc = Value::object();
        doc.insert("seq", Value::from(seq as i64));
        doc.insert("batch", Value::from("demo"));
        let mut readings = Value::array();
        readings.push(Value::from(0.5 * seq as f64));
        readings.push(Value::from(seq as i64 * 3));
        doc.insert("readings", readings);

        match seq % 10 {
            7 => wlog!("slow batch item {}", seq),
            9 => elog!("failed batch item {} {}", seq, doc.dump()),
            _ => dlog!("batch item {}", doc.dump()),
        }
    }

    ilog!("done");
    log::close();
    Ok(())
}
