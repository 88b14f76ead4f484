//! Asynchronous level logger
//!
//! Producers stamp and append records into a mutex-guarded ingest buffer; a
//! single flusher thread swaps it against a local buffer each tick and owns
//! all file I/O. The active file is closed once it crosses the configured
//! size and the next open runs the rotation ladder. Fatal records bypass the
//! queue, land in the normal log, stderr, and `<exe>.fatal`, then abort.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use super::config::LogConfig;
use super::signal;
use super::time::{LogTime, STAMP_LEN};
use super::Level;
use crate::buf::AppendBuf;
use crate::error::{Error, Result};

/// Maximum latency from a quiet append to a flush.
const FLUSH_TICK: Duration = Duration::from_millis(128);

/// Ingest buffer starting capacity; producers signal the flusher early once
/// the buffer is more than half full.
const INGEST_CAP: usize = 256 * 1024;

/// Prefix left in place of dropped records on overflow.
const OVERFLOW_MARK: &[u8] = b"......\n";

/// Manual-reset event: stays signaled until reset.
struct Event {
    state: Mutex<bool>,
    cv: Condvar,
}

impl Event {
    fn new() -> Self {
        Self {
            state: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn signal(&self) {
        *self.state.lock().unwrap() = true;
        self.cv.notify_all();
    }

    fn reset(&self) {
        *self.state.lock().unwrap() = false;
    }

    /// Wait until signaled or the timeout elapses; returns the signaled
    /// state.
    fn wait(&self, timeout: Duration) -> bool {
        let g = self.state.lock().unwrap();
        let (g, _) = self
            .cv
            .wait_timeout_while(g, timeout, |signaled| !*signaled)
            .unwrap();
        *g
    }
}

/// Producer-visible state, guarded by the log mutex.
struct Ingest {
    buf: AppendBuf,
    time_str: [u8; 16],
}

/// File state; the flusher is the only writer outside shutdown paths.
#[derive(Default)]
struct Sink {
    file: Option<File>,
    path: PathBuf,
    size: u64,
}

struct Inner {
    config: LogConfig,
    ingest: Mutex<Ingest>,
    event: Event,
    stop: AtomicI32,
    thread: Mutex<Option<JoinHandle<()>>>,
    sink: Mutex<Sink>,
    time: Mutex<LogTime>,
}

/// The asynchronous logger. Dropping the handle drains and stops the
/// flusher; the process-wide instance lives in [`super::logger`].
pub struct LevelLogger {
    inner: Arc<Inner>,
}

impl LevelLogger {
    /// Normalize the configuration and start the flusher thread.
    pub fn start(config: LogConfig) -> Result<Self> {
        let config = config.normalized();
        let time = LogTime::new();
        let mut time_str = [0u8; 16];
        time_str[..STAMP_LEN].copy_from_slice(time.get());

        let inner = Arc::new(Inner {
            config,
            ingest: Mutex::new(Ingest {
                buf: AppendBuf::with_capacity(INGEST_CAP),
                time_str,
            }),
            event: Event::new(),
            stop: AtomicI32::new(0),
            thread: Mutex::new(None),
            sink: Mutex::new(Sink::default()),
            time: Mutex::new(time),
        });

        let t = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("log-flusher".into())
            .spawn(move || t.flush_loop())
            .map_err(|e| Error::Log(format!("failed to spawn log flusher: {}", e)))?;
        *inner.thread.lock().unwrap() = Some(handle);

        Ok(Self { inner })
    }

    pub fn config(&self) -> &LogConfig {
        &self.inner.config
    }

    /// Enqueue a record. Bytes 1..=13 are overwritten with the cached
    /// timestamp. Records below the configured level are dropped; fatal
    /// records take [`LevelLogger::push_fatal`].
    pub fn push(&self, record: &mut AppendBuf, level: Level) {
        if level >= Level::Fatal {
            self.push_fatal(record);
        }
        if level < self.inner.config.min_log_level {
            return;
        }
        self.inner.push(record);
    }

    /// Write a fatal record synchronously, capture a backtrace into
    /// `<exe>.fatal`, and abort the process.
    pub fn push_fatal(&self, record: &mut AppendBuf) -> ! {
        self.inner.push_fatal(record)
    }

    /// Stop the flusher and drain buffered records.
    pub fn close(&self) {
        self.inner.close();
    }

    pub(crate) fn safe_stop(&self) {
        self.inner.safe_stop();
    }

    pub(crate) fn on_failure(&self) {
        self.inner.on_failure();
    }
}

impl Drop for LevelLogger {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl Inner {
    fn push(&self, record: &mut AppendBuf) {
        let mut g = self.ingest.lock().unwrap();

        let rec = record.as_mut_slice();
        if rec.len() > STAMP_LEN {
            rec[1..1 + STAMP_LEN].copy_from_slice(&g.time_str[..STAMP_LEN]);
        }

        if g.buf.len() >= self.config.max_log_buffer_size {
            let dropped = fold_overflow(&mut g.buf);
            eprintln!("log buffer is full, drop {} bytes", dropped);
        }

        g.buf.append(record.as_slice());
        let wake = g.buf.len() > g.buf.capacity() / 2;
        drop(g);
        if wake {
            self.event.signal();
        }
    }

    fn flush_loop(&self) {
        let mut local = AppendBuf::with_capacity(INGEST_CAP);

        while self.stop.load(Ordering::Acquire) == 0 {
            let signaled = self.event.wait(FLUSH_TICK);
            if self.stop.load(Ordering::Acquire) != 0 {
                break;
            }

            let mut stamp = [0u8; 16];
            let updated = {
                let mut time = self.time.lock().unwrap();
                match time.update() {
                    Some(s) => {
                        stamp[..STAMP_LEN].copy_from_slice(s);
                        true
                    }
                    None => false,
                }
            };

            {
                let mut g = self.ingest.lock().unwrap();
                if updated {
                    g.time_str[..STAMP_LEN].copy_from_slice(&stamp[..STAMP_LEN]);
                }
                if !g.buf.is_empty() {
                    g.buf.swap(&mut local);
                }
                if signaled {
                    self.event.reset();
                }
            }

            if !local.is_empty() {
                let mut sink = self.sink.lock().unwrap();
                self.write_to(&mut sink, local.as_slice());
                local.clear();
            }
        }

        // Published for the async-signal-safe shutdown spin.
        self.stop.store(2, Ordering::Release);
    }

    /// Write a drained chunk, open the file if needed, and make the
    /// rotation decision afterwards.
    fn write_to(&self, sink: &mut Sink, bytes: &[u8]) {
        if sink.file.is_none() {
            if let Some((path, file)) = self.open_log_file(false) {
                sink.size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                sink.path = path;
                sink.file = Some(file);
            }
        }
        if let Some(f) = sink.file.as_mut() {
            match f.write_all(bytes) {
                Ok(()) => sink.size += bytes.len() as u64,
                // Reported, not retried; the chunk is lost.
                Err(e) => eprintln!("log write failed: {}", e),
            }
            if !sink.path.exists() || sink.size >= self.config.max_log_file_size {
                sink.file = None;
            }
        }
        if self.config.cout {
            let _ = std::io::stderr().write_all(bytes);
        }
    }

    /// Open the log (or fatal) file in append mode, running the rotation
    /// ladder first when the file on disk is already over the size limit.
    fn open_log_file(&self, fatal: bool) -> Option<(PathBuf, File)> {
        let name = if fatal {
            format!("{}.fatal", exename())
        } else if self.config.log_file_name.is_empty() {
            format!("{}.log", exename())
        } else {
            self.config.log_file_name.clone()
        };
        let path = self.config.log_dir.join(name);

        if fs::metadata(&path).map(|m| m.len()).unwrap_or(0) >= self.config.max_log_file_size {
            // xx -> xx.1, xx.1 -> xx.2, ... dropping the oldest on a full
            // ladder.
            let mut paths = vec![path.clone()];
            for i in 1..self.config.max_log_file_num {
                let p = PathBuf::from(format!("{}.{}", path.display(), i));
                let exists = p.exists();
                paths.push(p);
                if !exists {
                    break;
                }
            }
            if paths.len() == self.config.max_log_file_num as usize {
                let _ = fs::remove_file(paths.last().unwrap());
            }
            for i in (1..paths.len()).rev() {
                let _ = fs::rename(&paths[i - 1], &paths[i]);
            }
        }

        if !self.config.log_dir.exists() {
            let _ = fs::create_dir_all(&self.config.log_dir);
        }
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => Some((path, f)),
            Err(e) => {
                // Keep running in memory; the next flush retries the open.
                eprintln!("can't open log file: {} ({})", path.display(), e);
                None
            }
        }
    }

    fn close(&self) {
        if self
            .stop
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.event.signal();
        let handle = self.thread.lock().unwrap().take();
        if let Some(h) = handle {
            let _ = h.join();
        }

        let mut g = self.ingest.lock().unwrap();
        if !g.buf.is_empty() {
            let mut sink = self.sink.lock().unwrap();
            self.write_to(&mut sink, g.buf.as_slice());
            g.buf.clear();
        }
    }

    /// Shutdown from a signal handler: CAS the stop flag, spin on 8 ms
    /// async-signal-safe sleeps until the flusher publishes its exit, then
    /// drain what can be drained without blocking.
    fn safe_stop(&self) {
        if self
            .stop
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        while self.stop.load(Ordering::Acquire) != 2 {
            signal::sleep_tick();
        }

        if let Ok(mut g) = self.ingest.try_lock() {
            if !g.buf.is_empty() {
                if let Ok(mut sink) = self.sink.try_lock() {
                    self.write_to(&mut sink, g.buf.as_slice());
                    g.buf.clear();
                }
            }
        }
    }

    fn push_fatal(&self, record: &mut AppendBuf) -> ! {
        self.close();

        {
            let time = self.time.lock().unwrap();
            let rec = record.as_mut_slice();
            if rec.len() > STAMP_LEN {
                rec[1..1 + STAMP_LEN].copy_from_slice(time.get());
            }
        }

        {
            let mut sink = self.sink.lock().unwrap();
            self.write_to(&mut sink, record.as_slice());
        }
        if !self.config.cout {
            let _ = std::io::stderr().write_all(record.as_slice());
        }

        if let Some((_, mut f)) = self.open_log_file(true) {
            let _ = f.write_all(record.as_slice());
            let _ = writeln!(f, "{}", std::backtrace::Backtrace::force_capture());
        }

        std::process::abort();
    }

    /// Crash-signal path: quiesce, then append the stamp and a backtrace to
    /// `<exe>.fatal`.
    fn on_failure(&self) {
        self.safe_stop();
        if let Some((_, mut f)) = self.open_log_file(true) {
            if let Ok(time) = self.time.try_lock() {
                let _ = f.write_all(time.get());
            }
            let _ = f.write_all(b"] ");
            let _ = writeln!(f, "{}", std::backtrace::Backtrace::force_capture());
        }
    }
}

/// Keep the second half of an overflowing ingest buffer, starting at the
/// first record boundary past the midpoint, behind a `......\n` mark.
/// Returns the number of payload bytes dropped.
fn fold_overflow(buf: &mut AppendBuf) -> usize {
    let mark = OVERFLOW_MARK.len();
    let from = (buf.len() >> 1) + mark;
    let data = buf.as_mut_slice();
    if from >= data.len() {
        let n = data.len();
        buf.clear();
        return n;
    }
    match data[from..].iter().position(|&c| c == b'\n') {
        Some(p) => {
            let keep_from = from + p + 1;
            let keep = data.len() - keep_from;
            data.copy_within(keep_from.., mark);
            data[..mark].copy_from_slice(OVERFLOW_MARK);
            buf.resize(keep + mark);
            keep_from
        }
        None => {
            let n = data.len();
            buf.clear();
            n
        }
    }
}

/// Executable name with any `.exe` suffix stripped.
pub(crate) fn exename() -> &'static str {
    static NAME: OnceLock<String> = OnceLock::new();
    NAME.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .map(|n| match n.strip_suffix(".exe") {
                Some(stem) => stem.to_owned(),
                None => n,
            })
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned())
    })
}
