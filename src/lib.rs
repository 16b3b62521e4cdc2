//! # Warmpool - Bidirectional Warm Connection Pool
//!
//! Warmpool keeps a reservoir of pre-established TCP (optionally
//! TLS-protected) connections between the two peers of a tunneling system,
//! so that user traffic can be carried on a warmed connection without
//! paying connect and handshake latency on the critical path.
//!
//! ## Features
//!
//! - **Client pool**: dials ahead of demand up to an adaptive target
//!   capacity and receives an 8-byte rendezvous ID per connection
//! - **Server pool**: accepts inbound connections, applies an optional
//!   client-IP allow-list, mints IDs and announces them to the peer
//! - **Adaptive refill**: two independent controllers tune the refill
//!   interval and the target capacity to observed demand and dial success
//! - **Active health validation**: hand-out on the server side probes each
//!   candidate with a brief read deadline and discards dead connections
//! - **TLS mode ladder**: plain TCP, TLS without verification, or TLS with
//!   full certificate and hostname verification
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warmpool::{ClientPool, ClientPoolConfig, TcpDialer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientPoolConfig::default();
//!     let dialer = Arc::new(TcpDialer::new("server.example.com:7000"));
//!     let pool = Arc::new(ClientPool::new(config, dialer)?);
//!
//!     let manager = pool.clone();
//!     tokio::spawn(async move { manager.run().await });
//!
//!     // ... later, claim a connection by the ID learned out-of-band
//!     // let conn = pool.get(id);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Each pool couples a registry (ID to connection) with a bounded FIFO
//! ready queue of IDs. The refill or accept loop publishes warmed
//! connections into both; hand-out removes them from both and transfers
//! ownership to the caller. Once dispensed, a connection never returns to
//! the pool.
//!
//! ```text
//! Client peer                        Server peer
//! dial, TLS, read ID, publish        accept, TLS, mint ID, write ID, publish
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod pool;
pub mod transport;

// Re-export commonly used items
pub use config::{ClientPoolConfig, ServerPoolConfig, SERVER_MAX_CAP};
pub use error::PoolError;
pub use pool::{ClientPool, ConnId, ServerPool};
pub use transport::{Dialer, PoolConn, TcpDialer};

/// Version of the warmpool library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the library
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "warmpool");
    }
}
