use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::http::request::read_request;
use crate::http::writer::{ResponseWriter, WriterStage};
use crate::server::handler::Handler;

/// A single accepted connection, good for exactly one request/response cycle.
pub struct Connection<H> {
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<H>,
}

impl<H: Handler> Connection<H> {
    pub fn new(stream: TcpStream, peer: SocketAddr, handler: Arc<H>) -> Self {
        Self {
            stream,
            peer,
            handler,
        }
    }

    /// Reads one request, hands it to the handler, then closes the connection.
    ///
    /// A request that fails to parse never reaches the handler. The write half
    /// is shut down on every path, including errors.
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            stream,
            peer,
            handler,
        } = self;
        let (mut reader, mut writer) = stream.into_split();

        let request = match read_request(&mut reader).await {
            Ok(request) => request,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Rejecting request");
                if let Err(e) = writer.shutdown().await {
                    debug!(peer = %peer, error = %e, "Failed to close rejected connection");
                }
                return Ok(());
            }
        };

        debug!(
            peer = %peer,
            method = request.method(),
            request_target = request.target(),
            body_len = request.body.len(),
            "Request parsed"
        );

        let mut writer = ResponseWriter::new(writer);
        handler.handle(&mut writer, request).await;

        match writer.stage() {
            WriterStage::StatusLine | WriterStage::Headers => {
                warn!(peer = %peer, stage = ?writer.stage(), "Handler returned before the header block was complete");
            }
            WriterStage::Trailers => {
                warn!(peer = %peer, "Handler ended a chunked body without writing trailers");
            }
            WriterStage::Body => {}
        }

        writer
            .into_inner()
            .shutdown()
            .await
            .context("failed to close connection")?;

        Ok(())
    }
}
