/*!
format.rs

Record serialization for `ghizmo` output paths.

Goals:
  - One formatted unit per record, written and flushed immediately so that a
    downstream pipe sees progress before the command finishes.
  - Deterministic output: JSON keys sorted, 2-space indentation, trailing
    newline. YAML in block style with every string scalar and key
    double-quoted, so values read back with their JSON types.
  - A top-level `null` is never emitted. The API layer uses it for "resource
    absent", which is always an error for the caller.

Public API Summary:
  - Format (json | yaml), parsed with `str::parse`
  - format_record(value, format) -> String
  - Sink::stdout(format) / Sink::new(format, writer) ; sink.emit(&value)
*/

use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::error::Error;

/* -------------------------------------------------------------------------- */
/* Format                                                                     */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Format::Json),
            "yaml" => Ok(Format::Yaml),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        })
    }
}

/// Serialize one record. Fails on a top-level `null` (absent resource).
pub fn format_record(value: &Value, format: Format) -> Result<String> {
    if value.is_null() {
        return Err(Error::Decode("resource not found (empty result)".into()).into());
    }
    match format {
        Format::Json => {
            // serde_json maps are ordered by key unless `preserve_order` is on.
            let mut out = serde_json::to_string_pretty(value).context("encoding JSON record")?;
            out.push('\n');
            Ok(out)
        }
        Format::Yaml => {
            let mut out = String::new();
            yaml_block(value, 0, &mut out)?;
            Ok(out)
        }
    }
}

/// Block-style YAML for `value` at `indent`. Mapping values that are
/// sequences stay at the key's indentation; sequence items that are
/// containers start on the dash line.
fn yaml_block(value: &Value, indent: usize, out: &mut String) -> Result<()> {
    let pad = " ".repeat(indent);
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                out.push_str(&pad);
                out.push_str(&yaml_quoted(key)?);
                out.push(':');
                match child {
                    Value::Object(m) if !m.is_empty() => {
                        out.push('\n');
                        yaml_block(child, indent + 2, out)?;
                    }
                    Value::Array(a) if !a.is_empty() => {
                        out.push('\n');
                        yaml_block(child, indent, out)?;
                    }
                    _ => {
                        out.push(' ');
                        out.push_str(&yaml_scalar(child)?);
                        out.push('\n');
                    }
                }
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for item in items {
                if is_block(item) {
                    let mut nested = String::new();
                    yaml_block(item, indent + 2, &mut nested)?;
                    out.push_str(&pad);
                    out.push_str("- ");
                    out.push_str(&nested[indent + 2..]);
                } else {
                    out.push_str(&pad);
                    out.push_str("- ");
                    out.push_str(&yaml_scalar(item)?);
                    out.push('\n');
                }
            }
        }
        _ => {
            out.push_str(&pad);
            out.push_str(&yaml_scalar(value)?);
            out.push('\n');
        }
    }
    Ok(())
}

fn is_block(value: &Value) -> bool {
    match value {
        Value::Object(m) => !m.is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => false,
    }
}

/// Flow form of a leaf or empty container.
fn yaml_scalar(value: &Value) -> Result<String> {
    Ok(match value {
        Value::String(s) => yaml_quoted(s)?,
        Value::Object(_) => "{}".to_string(),
        Value::Array(_) => "[]".to_string(),
        other => other.to_string(),
    })
}

// JSON string escapes are valid inside a YAML double-quoted scalar.
fn yaml_quoted(s: &str) -> Result<String> {
    serde_json::to_string(s).context("encoding YAML record")
}

/* -------------------------------------------------------------------------- */
/* Sink                                                                       */
/* -------------------------------------------------------------------------- */

/// Output sink bound to one format. Writes go straight through and are
/// flushed per record.
pub struct Sink {
    format: Format,
    out: RefCell<Box<dyn Write>>,
}

impl Sink {
    pub fn stdout(format: Format) -> Self {
        Self::new(format, std::io::stdout())
    }

    pub fn new(format: Format, writer: impl Write + 'static) -> Self {
        Self {
            format,
            out: RefCell::new(Box::new(writer)),
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn emit(&self, value: &Value) -> Result<()> {
        let text = format_record(value, self.format)?;
        let mut out = self.out.borrow_mut();
        out.write_all(text.as_bytes())
            .context("writing record to output")?;
        out.flush().context("flushing output")?;
        Ok(())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                      */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::rc::Rc;

    /// Clonable in-memory writer for inspecting sink output.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(pub Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        pub(crate) fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn json_sorted_indented_with_newline() {
        let out = format_record(&json!({"b": 1, "a": {"d": 2, "c": 3}}), Format::Json).unwrap();
        assert_eq!(
            out,
            "{\n  \"a\": {\n    \"c\": 3,\n    \"d\": 2\n  },\n  \"b\": 1\n}\n"
        );
    }

    #[test]
    fn json_round_trip() {
        let v = json!({"name": "v1.0", "n": 3, "ok": true, "list": ["x", 1.5]});
        let out = format_record(&v, Format::Json).unwrap();
        let back: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn yaml_parses_back_to_same_mapping() {
        let v = json!({"a": 1, "b": 2});
        let out = format_record(&v, Format::Yaml).unwrap();
        let back: Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn yaml_double_quotes_every_string() {
        let out = format_record(&json!({"a": 1, "b": "x", "c": true}), Format::Yaml).unwrap();
        assert_eq!(out, "\"a\": 1\n\"b\": \"x\"\n\"c\": true\n");
    }

    #[test]
    fn yaml_nested_block_layout() {
        let v = json!({
            "l": ["x", {"k": 1, "m": [true]}],
            "o": {"p": null, "q": [], "r": "say \"hi\"\n"}
        });
        let out = format_record(&v, Format::Yaml).unwrap();
        assert_eq!(
            out,
            concat!(
                "\"l\":\n",
                "- \"x\"\n",
                "- \"k\": 1\n",
                "  \"m\":\n",
                "  - true\n",
                "\"o\":\n",
                "  \"p\": null\n",
                "  \"q\": []\n",
                "  \"r\": \"say \\\"hi\\\"\\n\"\n",
            )
        );
        let back: Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn yaml_quotes_ambiguous_strings() {
        let v = json!({"flag": "true", "num": "12"});
        let out = format_record(&v, Format::Yaml).unwrap();
        let back: Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn null_record_is_an_error() {
        let err = format_record(&Value::Null, Format::Json).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Decode(_))));
    }

    #[test]
    fn unsupported_format_rejected() {
        assert_eq!("yaml".parse::<Format>().unwrap(), Format::Yaml);
        let err = "xml".parse::<Format>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(ref f) if f == "xml"));
    }

    #[test]
    fn sink_writes_each_record() {
        let buf = SharedBuf::default();
        let sink = Sink::new(Format::Json, buf.clone());
        sink.emit(&json!({"key": "value"})).unwrap();
        sink.emit(&json!({"key": "value"})).unwrap();
        assert_eq!(buf.text(), "{\n  \"key\": \"value\"\n}\n".repeat(2));
    }
}
