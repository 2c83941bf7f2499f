//! Demo application served by the `httpwire` binary.
//!
//! Routes by request target:
//!
//! - `/yourproblem`: 400 page
//! - `/myproblem`: 500 page
//! - `/httpbin/<path>`: relays `<upstream>/<path>` as a chunked body with
//!   `X-Content-SHA256` and `X-Content-Length` trailers
//! - `/video`: streams the configured video file
//! - anything else: 200 page

pub mod pages;
pub mod proxy;
pub mod video;

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWrite;
use tracing::{debug, warn};

use crate::config::Config;
use crate::http::headers::HeaderBlock;
use crate::http::request::Request;
use crate::http::writer::{ResponseWriter, StatusCode, WriterStage, default_headers};
use crate::server::Handler;
use proxy::Passthrough;
use video::VideoFile;

/// Largest chunk relayed from the upstream in one `write_chunked_body`.
pub const MAX_CHUNK_SIZE: usize = 1024;

const PASSTHROUGH_PREFIX: &str = "/httpbin";

pub struct App {
    passthrough: Passthrough,
    video_path: PathBuf,
}

impl App {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let upstream = url::Url::parse(&cfg.upstream)
            .with_context(|| format!("invalid upstream URL {:?}", cfg.upstream))?;
        if upstream.scheme() != "http" {
            anyhow::bail!("upstream must be plain http, got {}", upstream.scheme());
        }

        Ok(Self {
            passthrough: Passthrough::new(upstream, cfg.upstream_timeout()),
            video_path: PathBuf::from(&cfg.video_path),
        })
    }

    async fn route<W>(&self, w: &mut ResponseWriter<W>, req: &Request) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let target = req.target();

        if target == "/yourproblem" {
            return Ok(pages::respond(w, StatusCode::BadRequest).await?);
        }
        if target == "/myproblem" {
            return Ok(pages::respond(w, StatusCode::InternalServerError).await?);
        }
        if let Some(rest) = target.strip_prefix(PASSTHROUGH_PREFIX) {
            if rest.is_empty() || rest.starts_with('/') {
                return self.relay(w, req, rest.trim_start_matches('/')).await;
            }
        }
        if target == "/video" {
            return self.video(w).await;
        }

        Ok(pages::respond(w, StatusCode::Ok).await?)
    }

    async fn relay<W>(&self, w: &mut ResponseWriter<W>, req: &Request, path: &str) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut upstream = match self.passthrough.open(req, path).await {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(path, error = %e, "Upstream request failed");
                return Ok(pages::respond(w, StatusCode::InternalServerError).await?);
            }
        };
        debug!(path, status = upstream.status, "Relaying upstream response");

        let mut headers = default_headers(0);
        headers.remove("Content-Length");
        headers.set("Transfer-Encoding", "chunked");
        headers.set("Trailer", "X-Content-SHA256, X-Content-Length");
        if let Some(content_type) = upstream.headers.get("content-type") {
            headers.set("Content-Type", content_type);
        }

        w.write_status_line(StatusCode::Ok).await?;
        w.write_headers(&headers).await?;

        let mut relayed = 0usize;
        let mut hasher = Sha256::new();
        loop {
            match upstream.next_chunk(MAX_CHUNK_SIZE).await {
                Ok(Some(chunk)) => {
                    w.write_chunked_body(&chunk).await?;
                    hasher.update(&chunk);
                    relayed += chunk.len();
                }
                Ok(None) => break,
                Err(e) => {
                    // Headers are out already; end the body with what we have
                    warn!(path, relayed, error = %e, "Upstream body read failed");
                    break;
                }
            }
        }

        w.write_chunked_body_done().await?;

        let mut trailers = HeaderBlock::new();
        trailers.set("X-Content-SHA256", format!("{:x}", hasher.finalize()));
        trailers.set("X-Content-Length", relayed.to_string());
        w.write_trailers(&trailers).await?;
        Ok(())
    }

    async fn video<W>(&self, w: &mut ResponseWriter<W>) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        match VideoFile::open(&self.video_path).await {
            Ok(file) => file.send(w).await,
            Err(e) => {
                warn!(error = %e, "Video unavailable");
                Ok(pages::respond(w, StatusCode::InternalServerError).await?)
            }
        }
    }
}

#[async_trait]
impl Handler for App {
    async fn handle<W>(&self, w: &mut ResponseWriter<W>, req: Request)
    where
        W: AsyncWrite + Unpin + Send,
    {
        if let Err(e) = self.route(w, &req).await {
            warn!(request_target = req.target(), error = %e, "Failed to complete response");

            // Nothing sent yet, so the client can still get a proper error page
            if w.stage() == WriterStage::StatusLine {
                if let Err(e) = pages::respond(w, StatusCode::InternalServerError).await {
                    debug!(request_target = req.target(), error = %e, "Could not send error page");
                }
            }
        }
    }
}
