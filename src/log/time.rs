//! Cached log timestamp
//!
//! The flusher refreshes a `MMDD HH:MM:SS` string at most once per tick.
//! Within a one-minute window the update only patches the seconds (and on
//! carry, the minutes) through a two-digit lookup table; anything else falls
//! back to a full reformat.

use chrono::{Datelike, Local, Timelike};

/// Bytes in the `MMDD HH:MM:SS` stamp.
pub(crate) const STAMP_LEN: usize = 13;

pub(crate) struct LogTime {
    start: i64,
    minute: u32,
    sec: u32,
    buf: [u8; 16],
    cache: [[u8; 2]; 60],
}

impl LogTime {
    pub fn new() -> Self {
        let mut cache = [[0u8; 2]; 60];
        for (i, c) in cache.iter_mut().enumerate() {
            c[0] = b'0' + (i / 10) as u8;
            c[1] = b'0' + (i % 10) as u8;
        }
        let mut t = Self {
            start: 0,
            minute: 0,
            sec: 0,
            buf: [0u8; 16],
            cache,
        };
        t.reset();
        t
    }

    /// The current stamp.
    pub fn get(&self) -> &[u8] {
        &self.buf[..STAMP_LEN]
    }

    /// Full reformat from the system clock.
    pub fn reset(&mut self) {
        let now = Local::now();
        self.start = now.timestamp();
        self.minute = now.minute();
        self.sec = now.second();

        self.buf[..2].copy_from_slice(&self.cache[now.month() as usize]);
        self.buf[2..4].copy_from_slice(&self.cache[now.day() as usize]);
        self.buf[4] = b' ';
        self.buf[5..7].copy_from_slice(&self.cache[now.hour() as usize]);
        self.buf[7] = b':';
        self.buf[8..10].copy_from_slice(&self.cache[self.minute as usize]);
        self.buf[10] = b':';
        self.buf[11..13].copy_from_slice(&self.cache[self.sec as usize]);
    }

    /// Refresh the stamp. Returns the new stamp when it changed, `None`
    /// when the clock is still in the same second. Clock anomalies (a
    /// backward jump, or more than a minute elapsed) trigger a full reset.
    pub fn update(&mut self) -> Option<&[u8]> {
        let now_sec = Local::now().timestamp();
        if now_sec == self.start {
            return None;
        }

        let dt = now_sec - self.start;
        if !(0..=60).contains(&dt) {
            self.reset();
            return Some(self.get());
        }

        let sec = self.sec + dt as u32;
        if self.minute == 59 && sec > 59 {
            // Hour carry needs the full path.
            self.reset();
            return Some(self.get());
        }

        self.start = now_sec;
        if sec < 60 {
            self.sec = sec;
        } else {
            self.minute += 1;
            self.sec = sec - 60;
            self.buf[8..10].copy_from_slice(&self.cache[self.minute as usize]);
        }
        self.buf[11..13].copy_from_slice(&self.cache[self.sec as usize]);
        Some(self.get())
    }

    /// Pretend the stamp was taken `secs` seconds ago.
    #[cfg(test)]
    pub fn rewind(&mut self, secs: i64) {
        self.start -= secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_stamp_shape(s: &[u8]) {
        assert_eq!(s.len(), STAMP_LEN);
        for (i, &c) in s.iter().enumerate() {
            match i {
                4 => assert_eq!(c, b' '),
                7 | 10 => assert_eq!(c, b':'),
                _ => assert!(c.is_ascii_digit(), "byte {} is {:?}", i, c as char),
            }
        }
    }

    #[test]
    fn test_reset_shape() {
        let t = LogTime::new();
        assert_stamp_shape(t.get());
    }

    #[test]
    fn test_update_same_second_is_none() {
        let mut t = LogTime::new();
        // The fresh stamp was just taken; within the same second there is
        // nothing to do. A second boundary between new() and update() can
        // legitimately return Some, so only the shape is checked then.
        match t.update() {
            None => {}
            Some(s) => assert_stamp_shape(s),
        }
    }

    #[test]
    fn test_update_advances_monotonically() {
        let mut t = LogTime::new();
        let before = t.get().to_vec();
        t.rewind(1);
        let after = t.update().expect("one second elapsed").to_vec();
        assert_stamp_shape(&after);
        assert!(after.as_slice() >= before.as_slice());
    }

    #[test]
    fn test_update_minute_carry() {
        let mut t = LogTime::new();
        t.rewind(59);
        let s = t.update().expect("59 seconds elapsed").to_vec();
        assert_stamp_shape(&s);

        // Past the one-minute fast path: full reset.
        t.rewind(120);
        let s = t.update().expect("two minutes elapsed").to_vec();
        assert_stamp_shape(&s);
    }

    #[test]
    fn test_backward_jump_resets() {
        let mut t = LogTime::new();
        t.rewind(-30);
        let s = t.update().expect("clock moved backward").to_vec();
        assert_stamp_shape(&s);
    }
}
