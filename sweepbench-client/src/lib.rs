use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use sweepbench_common::frame::{encode_frame, read_frame};
use sweepbench_common::{BenchError, Result, DEFAULT_PAYLOAD};

pub mod load;
pub mod recorder;

/// Per-request deadline used when none is configured.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Echo client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub addr: SocketAddr,
    /// Body of every request; the server must echo it back unchanged.
    pub payload: Vec<u8>,
    /// Bound on a single connect or round trip.
    pub io_timeout: Duration,
}

impl ClientConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, payload: DEFAULT_PAYLOAD.to_vec(), io_timeout: DEFAULT_IO_TIMEOUT }
    }
}

/// One open connection to an echo server.
pub struct Connection {
    stream: TcpStream,
    /// Request frame, encoded once up front.
    request: Vec<u8>,
    payload: Vec<u8>,
    io_timeout: Duration,
}

impl Connection {
    /// Connect to `config.addr` with Nagle disabled.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let request = encode_frame(&config.payload)?;
        let stream = timeout(config.io_timeout, TcpStream::connect(config.addr))
            .await
            .map_err(|_| BenchError::Timeout {
                what: format!("connect to {}", config.addr),
                after: config.io_timeout,
            })?
            .map_err(|e| BenchError::ClientFailure(format!("connect to {}: {e}", config.addr)))?;
        stream.set_nodelay(true)?;
        Ok(Self { stream, request, payload: config.payload.clone(), io_timeout: config.io_timeout })
    }

    /// Send the request frame and wait for the matching echo.
    pub async fn round_trip(&mut self) -> Result<()> {
        let io_timeout = self.io_timeout;
        timeout(io_timeout, self.exchange())
            .await
            .map_err(|_| BenchError::Timeout { what: "echo reply".to_string(), after: io_timeout })?
    }

    async fn exchange(&mut self) -> Result<()> {
        self.stream.write_all(&self.request).await?;
        match read_frame(&mut self.stream).await? {
            Some(reply) if reply == self.payload => Ok(()),
            Some(reply) => Err(BenchError::Protocol(format!(
                "echo mismatch: sent {} bytes, got {} bytes back",
                self.payload.len(),
                reply.len()
            ))),
            None => Err(BenchError::ClientFailure("server closed the connection".to_string())),
        }
    }
}
