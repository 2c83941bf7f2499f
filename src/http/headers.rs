//! Header block parsing and storage.
//!
//! A [`HeaderBlock`] is filled one line at a time by [`HeaderBlock::parse_line`],
//! which works on whatever part of the stream has arrived so far and reports
//! how many bytes it consumed.

use std::collections::HashMap;

use crate::http::error::ParseError;

const CRLF: &[u8] = b"\r\n";

/// Case-insensitive header map.
///
/// Names are stored lower-cased. A name seen more than once keeps all of its
/// values, joined with `", "` in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    fields: HashMap<String, String>,
}

impl HeaderBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a single header line from the front of `buf`.
    ///
    /// Returns `(consumed, done)`:
    /// - `(0, false)` when `buf` holds no complete line yet
    /// - `(2, true)` when `buf` starts with the blank line ending the block
    /// - `(n, false)` after storing one field, `n` including its CRLF
    ///
    /// On error nothing is consumed and the block is left untouched.
    ///
    /// # Example
    ///
    /// ```
    /// # use httpwire::http::headers::HeaderBlock;
    /// let mut headers = HeaderBlock::new();
    /// let (n, done) = headers.parse_line(b"Host: localhost:42069\r\n\r\n").unwrap();
    /// assert_eq!((n, done), (23, false));
    /// assert_eq!(headers.get("host"), Some("localhost:42069"));
    /// ```
    pub fn parse_line(&mut self, buf: &[u8]) -> Result<(usize, bool), ParseError> {
        let Some(idx) = find_crlf(buf) else {
            return Ok((0, false));
        };

        if idx == 0 {
            return Ok((2, true));
        }

        let line = &buf[..idx];
        let colon = line.iter().position(|&b| b == b':').ok_or_else(|| {
            ParseError::malformed_header(format!(
                "missing colon in {:?}",
                String::from_utf8_lossy(line)
            ))
        })?;
        let (name, value) = (&line[..colon], &line[colon + 1..]);

        // `Foo : bar` is rejected, `Foo: bar` is not
        if name.last().is_some_and(u8::is_ascii_whitespace) {
            return Err(ParseError::malformed_header(format!(
                "whitespace before colon in {:?}",
                String::from_utf8_lossy(name)
            )));
        }

        // Tokens are ASCII, so a name that is not UTF-8 is not a token either
        let name = match std::str::from_utf8(name.trim_ascii_start()) {
            Ok(name) if is_token(name) => name,
            _ => {
                return Err(ParseError::malformed_header(format!(
                    "invalid field name {:?}",
                    String::from_utf8_lossy(name)
                )));
            }
        };

        // Values are opaque octets; anything outside UTF-8 is replaced
        let value = String::from_utf8_lossy(value.trim_ascii());
        self.append(name, &value);

        Ok((idx + 2, false))
    }

    /// Returns the value stored for `name`, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    /// Adds a value, joining it onto an existing one with `", "`.
    pub fn append(&mut self, name: &str, value: &str) {
        self.fields
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    /// Replaces whatever is stored for `name`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// RFC 7230 `token`: one or more tchars.
pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_tchar)
}

fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
        )
}
