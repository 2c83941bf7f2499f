//! Upstream passthrough
//!
//! Forwards a request to a plain-http upstream and hands back its response
//! head plus a reader for the body, so the caller can relay it as it arrives.

use std::time::Duration;

use anyhow::{Context, Result};
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::{Position, Url};

use crate::http::headers::{HeaderBlock, find_crlf};
use crate::http::request::Request;

/// Default buffer size for reading from the upstream
const BUFFER_SIZE: usize = 8192;

/// Upper bound on the upstream status line plus headers
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Hop-by-hop headers that must not be forwarded
const HOP_BY_HOP: [&str; 5] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
];

pub struct Passthrough {
    upstream: Url,
    timeout: Duration,
}

impl Passthrough {
    pub fn new(upstream: Url, timeout: Duration) -> Self {
        Self { upstream, timeout }
    }

    /// Resolves `path` (relative, without a leading slash) against the upstream.
    pub fn upstream_url(&self, path: &str) -> Result<Url> {
        self.upstream
            .join(path)
            .with_context(|| format!("cannot join {path:?} onto {}", self.upstream))
    }

    /// Connects to the upstream, sends `request` retargeted to `path`, and
    /// reads the response head.
    pub async fn open(&self, request: &Request, path: &str) -> Result<UpstreamResponse> {
        let url = self.upstream_url(path)?;

        let host = url.host_str().context("Upstream URL missing host")?;
        let port = url.port_or_known_default().unwrap_or(80);
        let addr = format!("{}:{}", host, port);

        let mut stream = timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .context("Connection timeout")?
            .with_context(|| format!("Failed to connect to upstream {addr}"))?;

        tracing::debug!(upstream = %url, "Connected to upstream");

        let request_bytes = build_upstream_request(request, &url);
        stream.write_all(&request_bytes).await?;
        stream.flush().await?;

        let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
        let (status, headers) = timeout(self.timeout, read_head(&mut stream, &mut buffer))
            .await
            .context("Upstream response timeout")??;

        let framing = BodyFraming::from_headers(&headers)?;

        Ok(UpstreamResponse {
            stream,
            buffer,
            status,
            headers,
            framing,
            timeout: self.timeout,
        })
    }
}

/// Builds the request bytes sent upstream.
///
/// The client's headers are forwarded minus hop-by-hop fields, `Host` is
/// pointed at the upstream and `Connection: close` is forced.
pub fn build_upstream_request(request: &Request, url: &Url) -> Vec<u8> {
    let mut buffer = Vec::new();

    buffer.extend_from_slice(
        format!(
            "{} {} HTTP/{}\r\n",
            request.method(),
            &url[Position::BeforePath..],
            request.line.version
        )
        .as_bytes(),
    );

    let mut headers = request.headers.clone();
    for name in HOP_BY_HOP {
        headers.remove(name);
    }

    if let Some(host) = url.host_str() {
        let host_value = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        headers.set("Host", host_value);
    }
    headers.set("Connection", "close");

    for (name, value) in headers.iter() {
        buffer.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
    }
    buffer.extend_from_slice(b"\r\n");

    buffer.extend_from_slice(&request.body);
    buffer
}

/// How the upstream delimits its body, and how far into it we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    /// `Content-Length` body with this many bytes still expected
    Length(usize),
    /// Waiting for a chunk-size line
    ChunkSize,
    /// Inside a chunk with this many data bytes left
    ChunkData(usize),
    /// Expecting the CRLF that closes a chunk's data
    ChunkEnd,
    /// After the last chunk; trailer lines are read and dropped
    ChunkTrailers,
    /// Neither framing header present, body runs until the upstream closes
    UntilClose,
    Done,
}

impl BodyFraming {
    /// `Transfer-Encoding: chunked` wins over `Content-Length`.
    fn from_headers(headers: &HeaderBlock) -> Result<Self> {
        let chunked = headers
            .get("transfer-encoding")
            .and_then(|v| v.rsplit(',').next())
            .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"));
        if chunked {
            return Ok(BodyFraming::ChunkSize);
        }

        match headers.get("content-length") {
            Some(v) => {
                let len = v
                    .trim()
                    .parse::<usize>()
                    .context("Invalid upstream content-length")?;
                Ok(BodyFraming::Length(len))
            }
            None => Ok(BodyFraming::UntilClose),
        }
    }
}

/// An upstream response whose body has not been read yet.
pub struct UpstreamResponse {
    stream: TcpStream,
    buffer: BytesMut,
    pub status: u16,
    pub headers: HeaderBlock,
    framing: BodyFraming,
    timeout: Duration,
}

impl UpstreamResponse {
    /// Returns the next piece of the body, at most `max` bytes long, or
    /// `None` once the body is complete.
    ///
    /// Chunked upstream bodies are decoded here: the pieces are payload bytes
    /// only, and upstream trailers are discarded.
    pub async fn next_chunk(&mut self, max: usize) -> Result<Option<Bytes>> {
        loop {
            match self.framing {
                BodyFraming::Done | BodyFraming::Length(0) => return Ok(None),
                BodyFraming::Length(remaining) => {
                    if self.buffer.is_empty() && self.fill(max).await? == 0 {
                        anyhow::bail!("Upstream closed with {remaining} body bytes missing");
                    }
                    let take = self.buffer.len().min(max).min(remaining);
                    self.framing = BodyFraming::Length(remaining - take);
                    return Ok(Some(self.buffer.split_to(take).freeze()));
                }
                BodyFraming::UntilClose => {
                    if self.buffer.is_empty() && self.fill(max).await? == 0 {
                        self.framing = BodyFraming::Done;
                        return Ok(None);
                    }
                    let take = self.buffer.len().min(max);
                    return Ok(Some(self.buffer.split_to(take).freeze()));
                }
                BodyFraming::ChunkSize => {
                    let Some(idx) = find_crlf(&self.buffer) else {
                        self.fill_chunked().await?;
                        continue;
                    };
                    let size = parse_chunk_size(&self.buffer[..idx])?;
                    self.buffer.advance(idx + 2);
                    self.framing = if size == 0 {
                        BodyFraming::ChunkTrailers
                    } else {
                        BodyFraming::ChunkData(size)
                    };
                }
                BodyFraming::ChunkData(remaining) => {
                    if self.buffer.is_empty() {
                        self.fill_chunked().await?;
                    }
                    let take = self.buffer.len().min(max).min(remaining);
                    self.framing = if take == remaining {
                        BodyFraming::ChunkEnd
                    } else {
                        BodyFraming::ChunkData(remaining - take)
                    };
                    return Ok(Some(self.buffer.split_to(take).freeze()));
                }
                BodyFraming::ChunkEnd => {
                    if self.buffer.len() < 2 {
                        self.fill_chunked().await?;
                        continue;
                    }
                    if &self.buffer[..2] != b"\r\n" {
                        anyhow::bail!("Upstream chunk data not followed by CRLF");
                    }
                    self.buffer.advance(2);
                    self.framing = BodyFraming::ChunkSize;
                }
                BodyFraming::ChunkTrailers => {
                    let Some(idx) = find_crlf(&self.buffer) else {
                        self.fill_chunked().await?;
                        continue;
                    };
                    self.buffer.advance(idx + 2);
                    if idx == 0 {
                        self.framing = BodyFraming::Done;
                    }
                }
            }
        }
    }

    /// Reads more body bytes from the upstream; returns 0 at EOF.
    async fn fill(&mut self, want: usize) -> Result<usize> {
        self.buffer.reserve(want.max(BUFFER_SIZE));
        let n = timeout(self.timeout, self.stream.read_buf(&mut self.buffer))
            .await
            .context("Upstream body timeout")??;
        Ok(n)
    }

    async fn fill_chunked(&mut self) -> Result<()> {
        // Prevent unbounded growth while looking for a size or trailer line
        if self.buffer.len() > MAX_HEAD_SIZE {
            anyhow::bail!("Upstream chunk line too long");
        }
        if self.fill(BUFFER_SIZE).await? == 0 {
            anyhow::bail!("Upstream closed in the middle of a chunked body");
        }
        Ok(())
    }
}

/// Parses a chunk-size line, ignoring any `;name=value` extensions.
fn parse_chunk_size(line: &[u8]) -> Result<usize> {
    let line = std::str::from_utf8(line).context("Invalid UTF-8 in upstream chunk size")?;
    let size = line.split(';').next().unwrap_or_default().trim();
    usize::from_str_radix(size, 16)
        .with_context(|| format!("Invalid upstream chunk size {size:?}"))
}

async fn read_head(stream: &mut TcpStream, buffer: &mut BytesMut) -> Result<(u16, HeaderBlock)> {
    loop {
        if let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = buffer.split_to(end + 4);
            return parse_head(&head);
        }

        // Prevent unbounded header growth
        if buffer.len() > MAX_HEAD_SIZE {
            anyhow::bail!("Upstream response headers too large");
        }

        let n = stream.read_buf(buffer).await?;
        if n == 0 {
            anyhow::bail!("Upstream closed before complete response head received");
        }
    }
}

/// Parses a status line and header block ending in an empty line.
pub fn parse_head(head: &[u8]) -> Result<(u16, HeaderBlock)> {
    let line_end = find_crlf(head).context("Empty upstream response")?;
    let status_line = std::str::from_utf8(&head[..line_end])
        .context("Invalid UTF-8 in upstream status line")?;

    let parts: Vec<&str> = status_line.splitn(3, ' ').collect();
    if parts.len() < 2 || !parts[0].starts_with("HTTP/") {
        anyhow::bail!("Invalid status line: {}", status_line);
    }
    let status: u16 = parts[1].parse().context("Invalid status code")?;

    let mut headers = HeaderBlock::new();
    let mut rest = &head[line_end + 2..];
    loop {
        let (n, done) = headers.parse_line(rest)?;
        if done {
            break;
        }
        if n == 0 {
            anyhow::bail!("Truncated upstream header block");
        }
        rest = &rest[n..];
    }

    Ok((status, headers))
}
