//! HTTP front end for the diagnostics flow.
//!
//! Every request to `/`, `/report`, `/report.json` or `/report.txt` runs the
//! full flow and returns the report in the requested format. `/health` is a
//! cheap liveness probe.
//!
//! # Example
//!
//! ```rust,ignore
//! use request_diagnostics::config::Config;
//! use request_diagnostics::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = Config::from_env()?;
//!     let server = Server::new(&config);
//!     server.run(config.server.listen_addr).await
//! }
//! ```

mod handler;
pub mod render;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub use handler::{diagnose, AppState, ConnInfo, Diagnosis};

use crate::config::Config;

/// Check if an error is a common connection reset or timeout.
#[inline]
fn is_connection_error(err_str: &str) -> bool {
    err_str.contains("connection reset")
        || err_str.contains("broken pipe")
        || err_str.contains("Connection reset")
        || err_str.contains("os error 104")
        || err_str.contains("os error 32")
        || err_str.contains("timed out")
}

/// Diagnostics HTTP server.
pub struct Server {
    state: Arc<AppState>,
    /// Active connections counter
    active_connections: Arc<AtomicUsize>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    shutdown_initiated: AtomicBool,
}

impl Server {
    pub fn new(config: &Config) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            state: Arc::new(AppState::new(config)),
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            shutdown_rx,
            shutdown_initiated: AtomicBool::new(false),
        }
    }

    /// Bind `addr` and serve until [`trigger_shutdown`](Self::trigger_shutdown).
    pub async fn run(&self, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(
        &self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let local_addr = listener.local_addr()?;
        info!("Listening on http://{}", local_addr);

        let mut shutdown_rx = self.shutdown_rx.clone();
        if *shutdown_rx.borrow() {
            return Ok(());
        }

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("Accept error: {}", e);
                            continue;
                        }
                    };
                    let _ = stream.set_nodelay(true);

                    let state = Arc::clone(&self.state);
                    let connections = Arc::clone(&self.active_connections);
                    let conn = ConnInfo {
                        client: remote_addr,
                        server: stream.local_addr().unwrap_or(local_addr),
                    };
                    tokio::spawn(async move {
                        connections.fetch_add(1, Ordering::Relaxed);
                        serve_connection(state, stream, conn).await;
                        connections.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                _ = shutdown_rx.changed() => {
                    debug!("Received shutdown signal, stopping accept loop");
                    break;
                }
            }
        }

        info!("Server stopped accepting connections");
        Ok(())
    }

    /// Stop accepting new connections. In-flight connections finish on their own.
    pub fn trigger_shutdown(&self) {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Number of connections currently being served.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

async fn serve_connection(state: Arc<AppState>, stream: TcpStream, conn: ConnInfo) {
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { handler::handle_request(&state, req, conn).await }
    });

    let io = TokioIo::new(stream);
    if let Err(err) = auto::Builder::new(TokioExecutor::new())
        .serve_connection(io, service)
        .await
    {
        let err_str = format!("{:?}", err);
        if !is_connection_error(&err_str) {
            debug!("Connection error: {:?}", err);
        }
    }
}
