//! Content-type keyed body encoders.
//!
//! An encoder is a plain function `(value, prefix, indent) -> bytes`. The
//! registry always holds one for `application/json`; anything it does not
//! know is encoded with that one too.

use std::collections::HashMap;
use std::sync::Arc;
use std::{fmt, io};

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{Formatter, PrettyFormatter, Serializer};

/// The content type every registry can encode.
pub const APPLICATION_JSON: &str = "application/json";

/// Failure reported by an encoder.
pub type MarshalError = Box<dyn std::error::Error + Send + Sync>;

/// A shareable encoder for one content type.
#[derive(Clone)]
pub struct Marshaler(Arc<dyn Fn(&Value, &str, &str) -> Result<Vec<u8>, MarshalError> + Send + Sync>);

impl Marshaler {
    pub fn new<F>(encode: F) -> Self
    where
        F: Fn(&Value, &str, &str) -> Result<Vec<u8>, MarshalError> + Send + Sync + 'static,
    {
        Self(Arc::new(encode))
    }

    /// Encodes `value`. Every line after the first starts with `prefix`
    /// followed by one `indent` per nesting level.
    pub fn encode(&self, value: &Value, prefix: &str, indent: &str) -> Result<Vec<u8>, MarshalError> {
        (self.0)(value, prefix, indent)
    }
}

impl fmt::Debug for Marshaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Marshaler(..)")
    }
}

/// The default `application/json` encoder: pretty-printed, one line per
/// element, object keys in sorted order.
///
/// `<`, `>`, `&`, U+2028 and U+2029 inside strings are written as `\u` escapes
/// so the output can be embedded in HTML and JavaScript as is.
pub fn json_indent(value: &Value, prefix: &str, indent: &str) -> Result<Vec<u8>, MarshalError> {
    let mut out = Vec::with_capacity(128);
    let formatter = HtmlSafe(PrettyFormatter::with_indent(indent.as_bytes()));
    let mut ser = Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;

    if prefix.is_empty() {
        return Ok(out);
    }
    // Raw newlines only occur between tokens; string contents are escaped.
    let mut prefixed = Vec::with_capacity(out.len() + prefix.len() * 8);
    for byte in out {
        prefixed.push(byte);
        if byte == b'\n' {
            prefixed.extend_from_slice(prefix.as_bytes());
        }
    }
    Ok(prefixed)
}

/// Pretty layout with HTML-sensitive characters escaped in strings and keys.
struct HtmlSafe<'a>(PrettyFormatter<'a>);

impl Formatter for HtmlSafe<'_> {
    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            let escaped = match c {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_value(writer)
    }
}

/// Encoders by content type.
///
/// Keys are compared exactly. Callers strip `;`-parameters first.
#[derive(Clone, Debug)]
pub struct Marshalers {
    json: Marshaler,
    others: HashMap<String, Marshaler>,
}

impl Marshalers {
    pub fn new() -> Self {
        Self { json: Marshaler::new(json_indent), others: HashMap::new() }
    }

    /// Registers `marshaler` for `content_type`, replacing any previous one.
    /// Registering `application/json` replaces the fallback encoder as well.
    pub fn register(&mut self, content_type: impl Into<String>, marshaler: Marshaler) {
        let content_type = content_type.into();
        if content_type == APPLICATION_JSON {
            self.json = marshaler;
        } else {
            self.others.insert(content_type, marshaler);
        }
    }

    /// The encoder registered for `content_type`, or the JSON one.
    pub fn lookup(&self, content_type: &str) -> &Marshaler {
        self.others.get(content_type).unwrap_or(&self.json)
    }

    /// Whether `content_type` has an encoder of its own.
    pub fn contains(&self, content_type: &str) -> bool {
        content_type == APPLICATION_JSON || self.others.contains_key(content_type)
    }
}

impl Default for Marshalers {
    fn default() -> Self { Self::new() }
}
