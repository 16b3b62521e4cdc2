//! Error types for warmpool
//!
//! The error surface is deliberately narrow: per-connection failures
//! (dial, handshake, ID exchange, liveness, back-pressure) are swallowed
//! by the refill and accept loops, which close the offending socket and
//! keep going. Only configuration problems and cancellation ever reach
//! the caller.

use thiserror::Error;

/// Main error type for warmpool operations
#[derive(Error, Debug)]
pub enum PoolError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pool was cancelled while the caller was blocked
    ///
    /// Carries a textual description of the cancellation cause. This is
    /// the only way a blocked [`ServerPool::get`](crate::ServerPool::get)
    /// call returns without a connection.
    #[error("Pool cancelled: {0}")]
    Cancelled(String),
}
