//! Fixed HTML pages for the status codes the server speaks.

use tokio::io::AsyncWrite;

use crate::http::error::WriteError;
use crate::http::writer::{ResponseWriter, StatusCode, default_headers};

pub fn page(status: StatusCode) -> String {
    let (heading, message) = match status {
        StatusCode::Ok => ("Success!", "Your request was handled."),
        StatusCode::BadRequest => ("Bad Request", "The request could not be served as sent."),
        StatusCode::InternalServerError => (
            "Internal Server Error",
            "Something went wrong on our side.",
        ),
    };

    format!(
        "<html>\n  <head>\n    <title>{} {}</title>\n  </head>\n  <body>\n    <h1>{}</h1>\n    <p>{}</p>\n  </body>\n</html>\n",
        status.as_u16(),
        status.reason_phrase(),
        heading,
        message,
    )
}

/// Writes a complete `text/html` response for `status`.
pub async fn respond<W>(w: &mut ResponseWriter<W>, status: StatusCode) -> Result<(), WriteError>
where
    W: AsyncWrite + Unpin,
{
    let body = page(status);

    let mut headers = default_headers(body.len());
    headers.set("Content-Type", "text/html");

    w.write_status_line(status).await?;
    w.write_headers(&headers).await?;
    w.write_body(body.as_bytes()).await?;
    Ok(())
}
