//! Small JSON writer for `Allocator::build_stats_string`/`Pool::build_stats_string`.
//!
//! Tracks object/array nesting discipline and an escape set, but targets an
//! owned `String` rather than a caller-managed buffer — a Rust caller has
//! no need for a paired alloc/free-callback string API (see DESIGN.md Open
//! Question).
use std::fmt::Write as _;

/// Builds a JSON document by hand, tracking container nesting so that
/// `begin_object`/`end_object` and `begin_array`/`end_array` calls must
/// balance — mismatches panic in debug builds, matching the original's
/// debug-only assertions.
pub struct JsonWriter {
    buf: String,
    stack: Vec<Container>,
    need_comma: Vec<bool>,
}

#[derive(PartialEq)]
enum Container {
    Object,
    Array,
}

impl JsonWriter {
    pub fn new() -> Self {
        Self { buf: String::new(), stack: Vec::new(), need_comma: vec![false] }
    }

    fn before_value(&mut self) {
        if *self.need_comma.last().unwrap() {
            self.buf.push(',');
        }
        *self.need_comma.last_mut().unwrap() = true;
    }

    pub(crate) fn write_key(&mut self, key: &str) {
        debug_assert_eq!(self.stack.last(), Some(&Container::Object), "key written outside an object");
        self.before_value();
        write_escaped_string(&mut self.buf, key);
        self.buf.push(':');
        *self.need_comma.last_mut().unwrap() = false;
    }

    pub fn begin_object(&mut self) {
        self.before_value();
        self.buf.push('{');
        self.stack.push(Container::Object);
        self.need_comma.push(false);
    }

    pub fn end_object(&mut self) {
        assert_eq!(self.stack.pop(), Some(Container::Object), "end_object without matching begin_object");
        self.need_comma.pop();
        self.buf.push('}');
    }

    pub fn begin_array(&mut self) {
        self.before_value();
        self.buf.push('[');
        self.stack.push(Container::Array);
        self.need_comma.push(false);
    }

    pub fn end_array(&mut self) {
        assert_eq!(self.stack.pop(), Some(Container::Array), "end_array without matching begin_array");
        self.need_comma.pop();
        self.buf.push(']');
    }

    pub fn field_u64(&mut self, key: &str, value: u64) {
        self.write_key(key);
        write!(self.buf, "{value}").unwrap();
        *self.need_comma.last_mut().unwrap() = true;
    }

    pub fn field_f64(&mut self, key: &str, value: f64) {
        self.write_key(key);
        write!(self.buf, "{value}").unwrap();
        *self.need_comma.last_mut().unwrap() = true;
    }

    pub fn field_str(&mut self, key: &str, value: &str) {
        self.write_key(key);
        write_escaped_string(&mut self.buf, value);
        *self.need_comma.last_mut().unwrap() = true;
    }

    pub fn value_u64(&mut self, value: u64) {
        self.before_value();
        write!(self.buf, "{value}").unwrap();
    }

    /// Finish the document. Panics if any container is still open.
    pub fn finish(self) -> String {
        assert!(self.stack.is_empty(), "JSON document finished with unclosed containers");
        self.buf
    }
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn write_escaped_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || !c.is_ascii() => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    write!(out, "\\u{:04x}", unit).unwrap();
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_flat_object() {
        let mut w = JsonWriter::new();
        w.begin_object();
        w.field_u64("blockCount", 3);
        w.field_str("name", "pool\n1");
        w.end_object();
        assert_eq!(w.finish(), r#"{"blockCount":3,"name":"pool\n1"}"#);
    }

    #[test]
    fn builds_nested_array() {
        let mut w = JsonWriter::new();
        w.begin_object();
        w.write_key("blocks");
        w.begin_array();
        w.value_u64(1);
        w.value_u64(2);
        w.end_array();
        w.end_object();
        assert_eq!(w.finish(), r#"{"blocks":[1,2]}"#);
    }

    #[test]
    #[should_panic(expected = "unclosed")]
    fn panics_on_unclosed_container() {
        let mut w = JsonWriter::new();
        w.begin_object();
        w.finish();
    }

    #[test]
    fn escapes_slash_and_control_characters() {
        let mut w = JsonWriter::new();
        w.begin_object();
        w.field_str("path", "a/b\u{8}\u{c}");
        w.end_object();
        assert_eq!(w.finish(), r#"{"path":"a\/b\b\f"}"#);
    }

    #[test]
    fn non_ascii_code_points_are_u_escaped() {
        let mut w = JsonWriter::new();
        w.begin_object();
        w.field_str("name", "caf\u{e9}");
        w.end_object();
        assert_eq!(w.finish(), "{\"name\":\"caf\\u00e9\"}");
    }
}
