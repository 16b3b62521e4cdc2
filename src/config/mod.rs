//! Configuration module for warmpool
//!
//! Defines the constructed-object configuration for the client and
//! server pools. Loading configuration from files or the command line is
//! the embedder's concern; these types only describe the knobs the pools
//! understand and how out-of-range values are normalized.

mod client;
mod server;

pub use client::ClientPoolConfig;
pub use server::{ServerPoolConfig, SERVER_MAX_CAP};

pub(crate) use client::Tunables;
