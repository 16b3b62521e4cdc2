//! Connection pool module for warmpool
//!
//! Implements the two halves of the warm connection pool: the dialing
//! [`ClientPool`] and the accepting [`ServerPool`]. Both couple a
//! registry with a bounded FIFO ready queue of IDs and share the same
//! lifecycle discipline: restartable managers, flush, and idempotent
//! close under a single cancellation scope.

mod client;
mod id;
mod lifecycle;
mod liveness;
mod server;
mod store;
mod tuning;

pub use client::ClientPool;
pub use id::ConnId;
pub use server::ServerPool;
