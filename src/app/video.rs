use std::path::Path;

use anyhow::Context;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite};

use crate::http::writer::{ResponseWriter, StatusCode, default_headers};

const READ_SIZE: usize = 8192;

/// An opened file, sized and ready to stream.
pub struct VideoFile {
    file: File,
    len: u64,
}

impl VideoFile {
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        let len = file.metadata().await?.len();
        Ok(Self { file, len })
    }

    /// Streams the file as the body of a `200 OK`, one read at a time.
    pub async fn send<W>(mut self, w: &mut ResponseWriter<W>) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let len = usize::try_from(self.len).context("file too large")?;
        let mut headers = default_headers(len);
        headers.set("Content-Type", "video/mp4");

        w.write_status_line(StatusCode::Ok).await?;
        w.write_headers(&headers).await?;

        let mut buf = vec![0u8; READ_SIZE];
        let mut sent = 0;
        loop {
            let n = self.file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            sent += w.write_body(&buf[..n]).await?;
        }

        if sent != len {
            anyhow::bail!("file changed while streaming: sent {sent} of {len} bytes");
        }
        Ok(())
    }
}
