use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::http::error::ParseError;
use crate::http::headers::{HeaderBlock, find_crlf, is_token};

const READ_BUFFER_SIZE: usize = 1024;

/// The first line of a request: `METHOD SP TARGET SP HTTP/1.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    /// The method token, e.g. `GET`
    pub method: String,
    /// Path and query exactly as sent (e.g. `/search?q=rust`)
    pub target: String,
    /// Protocol version without the `HTTP/` prefix; always `"1.1"`
    pub version: String,
}

/// A fully read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub line: RequestLine,
    pub headers: HeaderBlock,
    /// Exactly `Content-Length` bytes, or empty when the header is absent
    pub body: Vec<u8>,
}

impl Request {
    pub fn method(&self) -> &str {
        &self.line.method
    }

    pub fn target(&self) -> &str {
        &self.line.target
    }

    /// Retrieves a header value by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}

/// Where a [`RequestParser`] currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    RequestLine,
    Headers,
    Body,
    Done,
}

/// Incremental request parser.
///
/// Feed it the unconsumed tail of the stream with [`parse`](Self::parse);
/// it takes what it can and reports how many bytes it used. Bytes it does not
/// consume must be handed back on the next call together with whatever
/// arrived since. How the input is split across calls does not change the
/// result.
///
/// ```text
/// RequestLine ──▶ Headers ──▶ Body ──▶ Done
/// ```
#[derive(Debug)]
pub struct RequestParser {
    state: ParserState,
    line: Option<RequestLine>,
    headers: HeaderBlock,
    body: Vec<u8>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::RequestLine,
            line: None,
            headers: HeaderBlock::new(),
            body: Vec::new(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParserState::Done
    }

    /// Consumes as much of `data` as the current state allows.
    pub fn parse(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        let mut consumed = 0;

        loop {
            let rest = &data[consumed..];

            match self.state {
                ParserState::RequestLine => {
                    let Some(idx) = find_crlf(rest) else {
                        break;
                    };
                    self.line = Some(parse_request_line(&rest[..idx])?);
                    consumed += idx + 2;
                    self.state = ParserState::Headers;
                }

                ParserState::Headers => {
                    let (n, done) = self.headers.parse_line(rest)?;
                    consumed += n;
                    if done {
                        self.state = ParserState::Body;
                    } else if n == 0 {
                        break;
                    }
                }

                ParserState::Body => {
                    let Some(expected) = self.declared_length()? else {
                        self.state = ParserState::Done;
                        continue;
                    };

                    let take = (expected - self.body.len()).min(rest.len());
                    self.body.extend_from_slice(&rest[..take]);
                    consumed += take;

                    if self.body.len() == expected {
                        self.state = ParserState::Done;
                    } else {
                        break;
                    }
                }

                ParserState::Done => break,
            }
        }

        Ok(consumed)
    }

    /// Hands out the parsed request once the parser has reached `Done`.
    pub fn into_request(self) -> Result<Request, ParseError> {
        match (self.state, self.line) {
            (ParserState::Done, Some(line)) => Ok(Request {
                line,
                headers: self.headers,
                body: self.body,
            }),
            (state, _) => Err(ParseError::Incomplete { state }),
        }
    }

    fn declared_length(&self) -> Result<Option<usize>, ParseError> {
        self.headers
            .get("content-length")
            .map(|v| {
                v.parse::<usize>().map_err(|_| ParseError::InvalidContentLength {
                    value: v.to_string(),
                })
            })
            .transpose()
    }
}

fn parse_request_line(line: &[u8]) -> Result<RequestLine, ParseError> {
    let line = std::str::from_utf8(line)
        .map_err(|_| ParseError::malformed_request_line("request line is not valid UTF-8"))?;

    let parts: Vec<&str> = line.split(' ').collect();
    let [method, target, version] = parts.as_slice() else {
        return Err(ParseError::malformed_request_line(format!(
            "expected 3 fields, got {} in {line:?}",
            parts.len()
        )));
    };

    if !is_token(method) {
        return Err(ParseError::malformed_request_line(format!("invalid method {method:?}")));
    }

    if target.is_empty() {
        return Err(ParseError::malformed_request_line("empty request target"));
    }

    let version = match version.strip_prefix("HTTP/") {
        Some("1.1") => "1.1",
        _ => {
            return Err(ParseError::malformed_request_line(format!(
                "unsupported http version {version:?}"
            )));
        }
    };

    Ok(RequestLine {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
    })
}

/// Reads exactly one request from `reader`.
///
/// Bytes following the request body are left unread or discarded; there is
/// never a second request on the same connection.
pub async fn read_request<R>(reader: &mut R) -> Result<Request, ParseError>
where
    R: AsyncRead + Unpin,
{
    let mut parser = RequestParser::new();
    let mut buffer = BytesMut::with_capacity(READ_BUFFER_SIZE);

    loop {
        let consumed = parser.parse(&buffer)?;
        buffer.advance(consumed);

        if parser.is_done() {
            return parser.into_request();
        }

        buffer.reserve(READ_BUFFER_SIZE);
        let n = reader.read_buf(&mut buffer).await?;
        trace!(read = n, state = ?parser.state(), "read request bytes");

        if n == 0 {
            return Err(ParseError::Incomplete { state: parser.state() });
        }
    }
}
