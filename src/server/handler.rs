use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::http::request::Request;
use crate::http::writer::ResponseWriter;

/// The one extension point of the server.
///
/// A handler receives the parsed request together with a writer bound to the
/// connection and must drive the writer through a complete response before
/// returning. Whatever it has not written by then is lost: the connection is
/// closed right after.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle<W>(&self, w: &mut ResponseWriter<W>, req: Request)
    where
        W: AsyncWrite + Unpin + Send;
}
