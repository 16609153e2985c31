use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use sweepbench_common::frame::{read_frame, write_frame};
use sweepbench_common::Result;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
}

/// Counters shared by all connection tasks.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections: AtomicU64,
    pub frames: AtomicU64,
}

/// Length-prefixed echo server
pub struct Server {
    config: ServerConfig,
    stats: Arc<ServerStats>,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self { config, stats: Arc::new(ServerStats::default()) }
    }

    /// Get the server's configured address
    pub fn address(&self) -> SocketAddr {
        self.config.address
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// Run until the process is killed, signalling `ready_tx` with the bound
    /// address once accepting connections.
    pub async fn run(self, ready_tx: tokio::sync::oneshot::Sender<SocketAddr>) -> Result<()> {
        self.run_until(ready_tx, std::future::pending()).await
    }

    /// Run until `shutdown` completes. Open connections are dropped with the
    /// runtime.
    pub async fn run_until<F>(
        self,
        ready_tx: tokio::sync::oneshot::Sender<SocketAddr>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.address).await?;
        let local_addr = listener.local_addr()?;
        ready_tx.send(local_addr).ok();
        info!(%local_addr, "listening");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(
                        connections = self.stats.connections.load(Ordering::Relaxed),
                        frames = self.stats.frames.load(Ordering::Relaxed),
                        "shutting down"
                    );
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("accept failed: {e}");
                            continue;
                        }
                    };
                    self.stats.connections.fetch_add(1, Ordering::Relaxed);
                    let stats = Arc::clone(&self.stats);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, &stats).await {
                            debug!(%peer, "connection ended with error: {e}");
                        }
                    });
                }
            }
        }
    }
}

/// Echo every frame back until the client closes the connection.
pub async fn serve_connection(mut stream: TcpStream, stats: &ServerStats) -> Result<()> {
    stream.set_nodelay(true)?;
    while let Some(frame) = read_frame(&mut stream).await? {
        stats.frames.fetch_add(1, Ordering::Relaxed);
        write_frame(&mut stream, &frame).await?;
    }
    Ok(())
}
