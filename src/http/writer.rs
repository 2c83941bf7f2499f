use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::error::WriteError;
use crate::http::headers::HeaderBlock;

const HTTP_VERSION: &str = "HTTP/1.1";

/// HTTP status codes the writer knows a reason phrase for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use httpwire::http::writer::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = WriteError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            200 => Ok(StatusCode::Ok),
            400 => Ok(StatusCode::BadRequest),
            500 => Ok(StatusCode::InternalServerError),
            other => Err(WriteError::UnsupportedStatus(other)),
        }
    }
}

/// Headers every response starts from; handlers override fields with
/// [`HeaderBlock::set`] before writing them.
pub fn default_headers(content_length: usize) -> HeaderBlock {
    let mut headers = HeaderBlock::new();
    headers.set("Content-Length", content_length.to_string());
    headers.set("Connection", "close");
    headers.set("Content-Type", "text/plain");
    headers
}

/// Which part of the response the writer expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterStage {
    StatusLine,
    Headers,
    Body,
    Trailers,
}

/// Writes a response to `sink` one part at a time, in wire order.
///
/// ```text
///  StatusLine ──▶ Headers ──▶ Body ◀──────────────┐
///                              │ chunked_body_done │ trailers
///                              ▼                   │
///                           Trailers ──────────────┘
/// ```
///
/// A call made in the wrong stage fails with [`WriteError::Stage`] before
/// anything reaches the sink. The stage moves on only after a write succeeded.
#[derive(Debug)]
pub struct ResponseWriter<W> {
    sink: W,
    stage: WriterStage,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            stage: WriterStage::StatusLine,
        }
    }

    pub fn stage(&self) -> WriterStage {
        self.stage
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    pub async fn write_status_line(&mut self, status: StatusCode) -> Result<(), WriteError> {
        self.expect("write_status_line", WriterStage::StatusLine)?;

        let line = format!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            status.as_u16(),
            status.reason_phrase()
        );
        self.sink.write_all(line.as_bytes()).await?;

        self.stage = WriterStage::Headers;
        Ok(())
    }

    pub async fn write_headers(&mut self, headers: &HeaderBlock) -> Result<(), WriteError> {
        self.expect("write_headers", WriterStage::Headers)?;

        self.sink.write_all(&serialize_fields(headers)).await?;

        self.stage = WriterStage::Body;
        Ok(())
    }

    /// Writes body bytes verbatim. Matching the declared `Content-Length` is
    /// up to the caller.
    pub async fn write_body(&mut self, body: &[u8]) -> Result<usize, WriteError> {
        self.expect("write_body", WriterStage::Body)?;

        self.sink.write_all(body).await?;
        Ok(body.len())
    }

    /// Writes one chunk. An empty `chunk` produces a zero-size chunk, which is
    /// not the end-of-body marker; use [`write_chunked_body_done`](Self::write_chunked_body_done).
    pub async fn write_chunked_body(&mut self, chunk: &[u8]) -> Result<usize, WriteError> {
        self.expect("write_chunked_body", WriterStage::Body)?;

        let mut buf = Vec::with_capacity(chunk.len() + 12);
        buf.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        buf.extend_from_slice(chunk);
        buf.extend_from_slice(b"\r\n");
        self.sink.write_all(&buf).await?;

        Ok(buf.len())
    }

    /// Writes the last-chunk marker. Trailers (possibly none) must follow.
    pub async fn write_chunked_body_done(&mut self) -> Result<usize, WriteError> {
        self.expect("write_chunked_body_done", WriterStage::Body)?;

        self.sink.write_all(b"0\r\n").await?;

        self.stage = WriterStage::Trailers;
        Ok(3)
    }

    /// Writes the trailer fields and the final blank line.
    ///
    /// The writer drops back to `Body` afterwards. Nothing else is expected to
    /// be written once the trailers are out; the connection is closed next.
    pub async fn write_trailers(&mut self, trailers: &HeaderBlock) -> Result<(), WriteError> {
        self.expect("write_trailers", WriterStage::Trailers)?;

        self.sink.write_all(&serialize_fields(trailers)).await?;

        self.stage = WriterStage::Body;
        Ok(())
    }

    fn expect(&self, call: &'static str, stage: WriterStage) -> Result<(), WriteError> {
        if self.stage != stage {
            return Err(WriteError::Stage {
                call,
                stage: self.stage,
            });
        }
        Ok(())
    }
}

fn serialize_fields(fields: &HeaderBlock) -> Vec<u8> {
    let mut buf = Vec::new();

    for (name, value) in fields.iter() {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    buf.extend_from_slice(b"\r\n");
    buf
}
