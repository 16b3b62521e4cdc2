//! TCP dialer implementation
//!
//! A ready-made [`Dialer`] for plain TCP, with DNS caching and a connect
//! timeout. Embedders with custom transports supply their own `Dialer`
//! instead.

use super::{AddrMaybeCached, Dialer, SocketOpts};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

/// Dialer for plain TCP connections
#[derive(Debug, Clone)]
pub struct TcpDialer {
    /// Remote address to dial
    addr: AddrMaybeCached,
    /// Socket options to apply to new connections
    socket_opts: SocketOpts,
    /// Connection timeout
    connect_timeout: Duration,
}

impl TcpDialer {
    /// Create a new TCP dialer for the given address
    pub fn new(addr: &str) -> Self {
        TcpDialer {
            addr: AddrMaybeCached::new(addr),
            socket_opts: SocketOpts::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set socket options
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self) -> Result<TcpStream> {
        let resolved = self.addr.resolve().await?;

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(resolved))
            .await
            .with_context(|| format!("Connection timeout to {}", self.addr.addr()))?
            .with_context(|| format!("Failed to connect to {}", self.addr.addr()))?;

        self.socket_opts.apply(&stream)?;

        tracing::debug!("TCP connection established to {}", resolved);

        Ok(stream)
    }
}
