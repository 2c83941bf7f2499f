//! Accepts connections one at a time and logs the request read from each.

use httpwire::config::Config;
use httpwire::http::request::read_request;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let listener = TcpListener::bind(("0.0.0.0", cfg.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    loop {
        let (mut socket, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
                continue;
            }
        };
        info!("Accepted connection from {}", peer);

        let request = match read_request(&mut socket).await {
            Ok(request) => request,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Failed to read request");
                continue;
            }
        };

        info!(
            method = request.method(),
            request_target = request.target(),
            version = %request.line.version,
            "Request line"
        );
        for (name, value) in request.headers.iter() {
            info!("Header {}: {}", name, value);
        }
        info!("Body: {}", String::from_utf8_lossy(&request.body));
    }
}
