use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::http::connection::Connection;
use crate::server::handler::Handler;

/// A running server.
///
/// Accepting happens on a background task started by [`Server::serve`];
/// every accepted connection gets a task of its own. Dropping the handle does
/// not stop the server, [`Server::close`] does.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    accept_task: JoinHandle<()>,
}

impl Server {
    /// Listens on every interface at `port` and starts accepting.
    pub async fn serve<H: Handler>(port: u16, handler: H) -> io::Result<Self> {
        Self::bind(("0.0.0.0", port), handler).await
    }

    /// Like [`serve`](Self::serve) for an arbitrary address, e.g.
    /// `127.0.0.1:0` to let the OS pick a port.
    pub async fn bind<A, H>(addr: A, handler: H) -> io::Result<Self>
    where
        A: ToSocketAddrs,
        H: Handler,
    {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::new(handler),
            closed.clone(),
            shutdown.clone(),
        ));

        Ok(Self {
            local_addr,
            closed,
            shutdown,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops accepting new connections.
    ///
    /// Connections already being handled run to completion.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// Waits for the accept loop to finish, i.e. for a [`close`](Self::close)
    /// to take effect.
    pub async fn wait(self) {
        if let Err(e) = self.accept_task.await {
            error!(error = %e, "Accept loop panicked");
        }
    }
}

async fn accept_loop<H: Handler>(
    listener: TcpListener,
    handler: Arc<H>,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    // Only this task holds the listener, so returning from here closes it.
    loop {
        let accepted = tokio::select! {
            res = listener.accept() => res,
            _ = shutdown.notified() => Err(io::Error::other("listener closed")),
        };

        let (socket, peer) = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                if closed.load(Ordering::SeqCst) {
                    info!("Listener closed, no longer accepting connections");
                    return;
                }
                error!(error = %e, "Failed to accept connection");
                continue;
            }
        };

        info!("Accepted connection from {}", peer);

        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(e) = Connection::new(socket, peer, handler).run().await {
                error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
