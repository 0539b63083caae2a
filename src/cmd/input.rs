/*!
input.rs - newline-delimited JSON on standard input.

Each non-empty line is decoded independently as one JSON value (string,
number, array, object...). Decoding is lazy: a malformed line fails only when
it is pulled, so earlier items have already been processed and emitted.

Concatenated JSON without newline framing is not supported.
*/

use std::cell::{RefCell, RefMut};
use std::io::{BufRead, BufReader};

use serde_json::Value;

use crate::error::{Error, Result};

/// Single-pass source of input lines, owned by the run context.
pub struct Input {
    reader: RefCell<Box<dyn BufRead>>,
}

impl Input {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()))
    }

    pub fn new(reader: impl BufRead + 'static) -> Self {
        Self {
            reader: RefCell::new(Box::new(reader)),
        }
    }

    /// Lazily decoded JSON values, one per non-empty line.
    ///
    /// The underlying stream is not seekable; a second call simply continues
    /// where the first one stopped.
    pub fn lines(&self) -> JsonLines<'_> {
        JsonLines {
            reader: self.reader.borrow_mut(),
            line_no: 0,
            done: false,
        }
    }
}

pub struct JsonLines<'a> {
    reader: RefMut<'a, Box<dyn BufRead>>,
    line_no: usize,
    done: bool,
}

impl Iterator for JsonLines<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_no += 1;
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Some(serde_json::from_str(trimmed).map_err(|e| {
                        Error::Decode(format!(
                            "input line {}: invalid JSON ({e}): {trimmed}",
                            self.line_no
                        ))
                    }));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(Error::Decode(format!(
                        "input line {}: {e}",
                        self.line_no + 1
                    ))));
                }
            }
        }
        None
    }
}

/// Interpret an input item as a name string (ref, branch, login...).
pub fn expect_name(item: &Value, what: &str) -> Result<String> {
    match item {
        Value::String(s) => Ok(s.clone()),
        other => Err(Error::Decode(format!(
            "expected a {what} string on input, got: {other}"
        ))),
    }
}
