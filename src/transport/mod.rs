//! Transport module for warmpool
//!
//! Provides the dialer abstraction the client pool warms connections
//! through, socket option handling, and the boxed stream type both pools
//! store. TLS wrapping lives in [`tls`].

mod addr;
mod tcp;
pub mod tls;

pub use addr::AddrMaybeCached;
pub use tcp::TcpDialer;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Socket options applied to every pooled connection
///
/// Keep-alive is armed on the raw TCP socket before any TLS wrap; a
/// wrapped stream no longer exposes the TCP layer.
#[derive(Debug, Clone, Copy)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keep-alive period, `None` leaves keep-alive unarmed
    pub keepalive: Option<Duration>,
}

impl Default for SocketOpts {
    fn default() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive: Some(Duration::from_secs(20)),
        }
    }
}

impl SocketOpts {
    /// Apply the options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> std::io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let Some(period) = self.keepalive {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new().with_time(period);
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }
}

/// Dialer trait for creating outbound connections
///
/// A dialer is a parameterless operation that produces a connected TCP
/// stream. Address selection, timeouts and retry policy are entirely the
/// dialer's concern; the pool only calls [`dial`](Dialer::dial) and wraps
/// the result. [`TcpDialer`] is a ready-made implementation.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Establish one new connection
    async fn dial(&self) -> Result<TcpStream>;
}

/// Stream trait for connections held by a pool
///
/// Implemented for every async stream that can be read, written and sent
/// across tasks. Plain TCP streams and TLS streams both qualify.
pub trait PoolStream: AsyncRead + AsyncWrite + Unpin + Send + Sync + Debug {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync + Debug> PoolStream for T {}

/// A warmed connection as stored in, and dispensed by, a pool
pub type PoolConn = Box<dyn PoolStream>;
