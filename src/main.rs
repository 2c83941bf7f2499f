use httpwire::app::App;
use httpwire::config::Config;
use httpwire::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let app = App::new(&cfg)?;

    let server = Server::serve(cfg.port, app).await?;
    tracing::info!(port = cfg.port, "Server started");

    shutdown_signal().await?;
    tracing::info!("Shutdown signal received");

    server.close();
    server.wait().await;
    tracing::info!("Server gracefully stopped");

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
