//! End-to-end tests for the asynchronous level logger

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use rotolog::{AppendBuf, Level, LevelLogger, LogConfig};

/// Build a record the way the log macros do: sigil, 13-byte stamp
/// placeholder, a space, the payload, and the newline.
fn record(level: Level, payload: &str) -> AppendBuf {
    let mut buf = AppendBuf::new();
    buf.push(level.sigil());
    buf.append(b"0000 00:00:00");
    buf.push(b' ');
    let _ = write!(buf, "{}", payload);
    buf.push(b'\n');
    buf
}

fn config(dir: &Path) -> LogConfig {
    LogConfig {
        log_dir: dir.to_path_buf(),
        log_file_name: "app.log".into(),
        ..LogConfig::default()
    }
}

fn read_log(dir: &Path) -> String {
    fs::read_to_string(dir.join("app.log")).unwrap_or_default()
}

fn assert_stamped(line: &str, sigil: char) {
    let bytes = line.as_bytes();
    assert_eq!(bytes[0] as char, sigil, "line {:?}", line);
    // MMDD HH:MM:SS, freshly stamped (a zero month never occurs).
    let stamp = &line[1..14];
    assert_ne!(stamp, "0000 00:00:00", "stamp not applied in {:?}", line);
    for (i, c) in stamp.char_indices() {
        match i {
            4 => assert_eq!(c, ' '),
            7 | 10 => assert_eq!(c, ':'),
            _ => assert!(c.is_ascii_digit(), "stamp {:?}", stamp),
        }
    }
    assert_eq!(&line[14..15], " ");
}

#[test]
fn test_record_shape_on_disk() {
    let tmp = TempDir::new().unwrap();
    let lg = LevelLogger::start(config(tmp.path())).unwrap();

    let mut rec = record(Level::Info, "hello");
    lg.push(&mut rec, Level::Info);
    lg.close();

    let text = read_log(tmp.path());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    assert_stamped(lines[0], 'I');
    assert!(lines[0].ends_with(" hello"));
}

#[test]
fn test_min_level_drops_records() {
    let tmp = TempDir::new().unwrap();
    let lg = LevelLogger::start(LogConfig {
        min_log_level: Level::Warning,
        ..config(tmp.path())
    })
    .unwrap();

    lg.push(&mut record(Level::Debug, "quiet"), Level::Debug);
    lg.push(&mut record(Level::Info, "quiet"), Level::Info);
    lg.push(&mut record(Level::Warning, "kept-w"), Level::Warning);
    lg.push(&mut record(Level::Error, "kept-e"), Level::Error);
    lg.close();

    let text = read_log(tmp.path());
    assert!(!text.contains("quiet"));
    assert!(text.contains("kept-w"));
    assert!(text.contains("kept-e"));
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn test_levels_sigils_in_file() {
    let tmp = TempDir::new().unwrap();
    let lg = LevelLogger::start(config(tmp.path())).unwrap();

    for level in [Level::Debug, Level::Info, Level::Warning, Level::Error] {
        lg.push(&mut record(level, level.as_str()), level);
    }
    lg.close();

    let text = read_log(tmp.path());
    let sigils: String = text.lines().map(|l| &l[..1]).collect();
    assert_eq!(sigils, "DIWE");
}

#[test]
fn test_rotation_ladder() {
    let tmp = TempDir::new().unwrap();
    let cfg = LogConfig {
        max_log_file_size: 100,
        max_log_file_num: 3,
        ..config(tmp.path())
    };

    // Each session writes one ~100-byte chunk; the next open rotates.
    for round in 0..5 {
        let lg = LevelLogger::start(cfg.clone()).unwrap();
        let payload = format!("round {} {}", round, "x".repeat(80));
        lg.push(&mut record(Level::Info, &payload), Level::Info);
        lg.close();
    }

    let mut names: Vec<String> = fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["app.log", "app.log.1", "app.log.2"]);

    // Newest record sits in the active file, oldest surviving in .2.
    assert!(read_log(tmp.path()).contains("round 4"));
    let oldest = fs::read_to_string(tmp.path().join("app.log.2")).unwrap();
    assert!(oldest.contains("round 2"));
}

#[test]
fn test_open_failure_keeps_running() {
    let tmp = TempDir::new().unwrap();
    // A directory where the log file should be makes the open fail.
    fs::create_dir_all(tmp.path().join("app.log")).unwrap();

    let lg = LevelLogger::start(config(tmp.path())).unwrap();
    lg.push(&mut record(Level::Info, "lost but harmless"), Level::Info);
    lg.close();
    // No panic, no file; the record was dropped with a diagnostic.
    assert!(tmp.path().join("app.log").is_dir());
}

#[test]
fn test_concurrent_producers_keep_order_per_thread() {
    let tmp = TempDir::new().unwrap();
    let lg = Arc::new(LevelLogger::start(config(tmp.path())).unwrap());

    let mut handles = Vec::new();
    for t in 0..4 {
        let lg = Arc::clone(&lg);
        handles.push(std::thread::spawn(move || {
            for i in 0..200 {
                let mut rec = record(Level::Info, &format!("t{} seq {}", t, i));
                lg.push(&mut rec, Level::Info);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    lg.close();

    let text = read_log(tmp.path());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4 * 200);

    // Within each producer thread, delivery order matches call order.
    for t in 0..4 {
        let marker = format!("t{} seq ", t);
        let seqs: Vec<usize> = lines
            .iter()
            .filter_map(|l| l.split(&marker).nth(1))
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(seqs, (0..200).collect::<Vec<_>>(), "thread {}", t);
    }
}

#[test]
fn test_default_file_name_uses_exename() {
    let tmp = TempDir::new().unwrap();
    let lg = LevelLogger::start(LogConfig {
        log_dir: tmp.path().to_path_buf(),
        ..LogConfig::default()
    })
    .unwrap();
    lg.push(&mut record(Level::Info, "named after the test binary"), Level::Info);
    lg.close();

    let names: Vec<String> = fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(".log"), "got {:?}", names);
}

#[test]
fn test_log_dir_created_if_missing() {
    let tmp = TempDir::new().unwrap();
    let nested = tmp.path().join("a").join("b");
    let lg = LevelLogger::start(config(&nested)).unwrap();
    lg.push(&mut record(Level::Info, "mkdir"), Level::Info);
    lg.close();
    assert!(nested.join("app.log").exists());
}
