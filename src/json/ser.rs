//! JSON serialization
//!
//! Compact, pretty, and debug renderings of a [`Value`], all writing into an
//! [`AppendBuf`]. The compact form is canonical: no spaces, the exact escape
//! set `\r \n \t \b \f " \\`, integers in base 10, floats in the shortest
//! round-tripping form. Control bytes outside the escape set pass through
//! unchanged.

use super::value::Value;
use crate::buf::AppendBuf;

/// Escape table: byte value to escape letter, zero for pass-through.
const fn escape_table() -> [u8; 256] {
    let mut tb = [0u8; 256];
    tb[b'\r' as usize] = b'r';
    tb[b'\n' as usize] = b'n';
    tb[b'\t' as usize] = b't';
    tb[0x08] = b'b';
    tb[0x0c] = b'f';
    tb[b'"' as usize] = b'"';
    tb[b'\\' as usize] = b'\\';
    tb
}

static E2S: [u8; 256] = escape_table();

/// Debug rendering truncates strings longer than this.
const DBG_MAX: usize = 256;

fn write_string(fs: &mut AppendBuf, s: &str, debug: bool) {
    fs.push(b'"');
    let bytes = s.as_bytes();
    let trunc = debug && bytes.len() > DBG_MAX;
    let e = if trunc { DBG_MAX } else { bytes.len() };

    let mut from = 0;
    for (i, &c) in bytes[..e].iter().enumerate() {
        let esc = E2S[c as usize];
        if esc != 0 {
            fs.append(&bytes[from..i]).push(b'\\').push(esc);
            from = i + 1;
        }
    }
    if from != e {
        fs.append(&bytes[from..e]);
    }
    if trunc {
        fs.append_fill(3, b'.');
    }
    fs.push(b'"');
}

fn write_compact(v: &Value, fs: &mut AppendBuf, debug: bool) {
    if v.is_null() {
        fs.append(b"null");
    } else if let Some(s) = v.as_str() {
        write_string(fs, s, debug);
    } else if v.is_object() {
        fs.push(b'{');
        for (i, (key, item)) in v.entries().enumerate() {
            if i > 0 {
                fs.push(b',');
            }
            write_string(fs, key, debug);
            fs.push(b':');
            write_compact(item, fs, debug);
        }
        fs.push(b'}');
    } else if let Some(items) = v.as_array() {
        fs.push(b'[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                fs.push(b',');
            }
            write_compact(item, fs, debug);
        }
        fs.push(b']');
    } else if let Some(i) = v.as_int() {
        fs.append_i64(i);
    } else if let Some(b) = v.as_bool() {
        fs.append_bool(b);
    } else {
        fs.append_f64(v.get_double());
    }
}

// @indent: spaces per nesting level
// @n: spaces to insert at the beginning of the current line
fn write_pretty(v: &Value, fs: &mut AppendBuf, indent: usize, n: usize) {
    if v.is_object() {
        fs.push(b'{');
        let count = v.len();
        for (i, (key, item)) in v.entries().enumerate() {
            fs.push(b'\n').append_fill(n, b' ');
            write_string(fs, key, false);
            fs.append(b": ");
            if item.is_object() || item.is_array() {
                write_pretty(item, fs, indent, n + indent);
            } else {
                write_compact(item, fs, false);
            }
            if i + 1 < count {
                fs.push(b',');
            } else {
                fs.push(b'\n');
            }
        }
        if n > indent {
            fs.append_fill(n - indent, b' ');
        }
        fs.push(b'}');
    } else if v.is_array() {
        fs.push(b'[');
        let items = v.as_array().unwrap_or(&[]);
        for (i, item) in items.iter().enumerate() {
            fs.push(b'\n').append_fill(n, b' ');
            if item.is_object() || item.is_array() {
                write_pretty(item, fs, indent, n + indent);
            } else {
                write_compact(item, fs, false);
            }
            if i + 1 < items.len() {
                fs.push(b',');
            } else {
                fs.push(b'\n');
            }
        }
        if n > indent {
            fs.append_fill(n - indent, b' ');
        }
        fs.push(b']');
    } else {
        write_compact(v, fs, false);
    }
}

impl Value {
    /// Serialize into `fs` in compact form.
    pub fn dump_to(&self, fs: &mut AppendBuf) {
        write_compact(self, fs, false);
    }

    /// Compact JSON text.
    pub fn dump(&self) -> String {
        let mut fs = AppendBuf::with_capacity(64);
        write_compact(self, &mut fs, false);
        String::from_utf8_lossy(fs.as_slice()).into_owned()
    }

    /// Pretty JSON text with four spaces per level.
    pub fn pretty(&self) -> String {
        self.pretty_indent(4)
    }

    /// Pretty JSON text with `indent` spaces per level.
    pub fn pretty_indent(&self, indent: usize) -> String {
        let mut fs = AppendBuf::with_capacity(64);
        write_pretty(self, &mut fs, indent, indent);
        String::from_utf8_lossy(fs.as_slice()).into_owned()
    }

    /// Compact form with long strings truncated, for log output.
    pub fn dbg(&self) -> String {
        let mut fs = AppendBuf::with_capacity(64);
        write_compact(self, &mut fs, true);
        String::from_utf8_lossy(fs.as_slice()).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(Value::null().dump(), "null");
        assert_eq!(Value::from(true).dump(), "true");
        assert_eq!(Value::from(false).dump(), "false");
        assert_eq!(Value::from(-7i64).dump(), "-7");
        assert_eq!(Value::from(2.5).dump(), "2.5");
        assert_eq!(Value::string("hi").dump(), "\"hi\"");
    }

    #[test]
    fn test_compact_object_and_array() {
        let mut o = Value::object();
        o.insert("a", Value::from(1i64));
        let mut arr = Value::array();
        arr.push(Value::from(true));
        arr.push(Value::null());
        arr.push(Value::from(2.5));
        o.insert("b", arr);
        assert_eq!(o.dump(), "{\"a\":1,\"b\":[true,null,2.5]}");
    }

    #[test]
    fn test_string_escapes() {
        let v = Value::string("a\"b\\c\nd\te\rf\u{8}g\u{c}h");
        assert_eq!(v.dump(), "\"a\\\"b\\\\c\\nd\\te\\rf\\bg\\fh\"");
    }

    #[test]
    fn test_control_chars_pass_through() {
        // Bytes below 0x20 outside the escape set are written raw.
        let v = Value::string("x\u{1}y");
        assert_eq!(v.dump(), "\"x\u{1}y\"");
    }

    #[test]
    fn test_pretty() {
        let mut o = Value::object();
        o.insert("a", Value::from(1i64));
        let mut arr = Value::array();
        arr.push(Value::from(true));
        o.insert("b", arr);
        assert_eq!(
            o.pretty(),
            "{\n    \"a\": 1,\n    \"b\": [\n        true\n    ]\n}"
        );
    }

    #[test]
    fn test_pretty_empty_collections() {
        assert_eq!(Value::object().pretty(), "{}");
        assert_eq!(Value::array().pretty(), "[]");
    }

    #[test]
    fn test_pretty_custom_indent() {
        let mut o = Value::object();
        o.insert("k", Value::from(1i64));
        assert_eq!(o.pretty_indent(2), "{\n  \"k\": 1\n}");
    }

    #[test]
    fn test_dbg_truncates_long_strings() {
        let long = "x".repeat(300);
        let v = Value::string(&long);
        let out = v.dbg();
        assert_eq!(out.len(), 1 + 256 + 3 + 1);
        assert!(out.ends_with("...\""));
        // The normal dump does not truncate.
        assert_eq!(v.dump().len(), 302);
    }
}
