//! Server-side pool: accepts and announces
//!
//! The accept loop admits inbound connections one at a time: filter by
//! client IP, wrap in TLS when configured, mint an 8-byte ID, announce
//! it to the peer, then publish. Hand-out is FIFO and actively
//! validated: each candidate must pass the liveness probe or it is
//! discarded and the next one is tried.

use crate::config::{ServerPoolConfig, SERVER_MAX_CAP};
use crate::error::PoolError;
use crate::pool::id::{self, ConnId};
use crate::pool::lifecycle::ManagerScope;
use crate::pool::liveness;
use crate::pool::store::{PoolStore, RegisterOutcome};
use crate::transport::tls;
use crate::transport::{PoolConn, SocketOpts};
use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The accepting half of a warm connection pool
pub struct ServerPool {
    store: PoolStore,
    listener: TcpListener,
    /// Textual IP the remote peer must match, if restricted
    allow_ip: Option<String>,
    tls: Option<TlsAcceptor>,
    socket_opts: SocketOpts,
    err_count: AtomicUsize,
    scope: ManagerScope,
}

impl ServerPool {
    /// Create a server pool over a bound listener
    ///
    /// `tls_config` is opaque to the pool; when present, every accepted
    /// connection is wrapped server-side before the ID announcement.
    pub fn new(
        config: ServerPoolConfig,
        tls_config: Option<Arc<ServerConfig>>,
        listener: TcpListener,
    ) -> Self {
        ServerPool {
            store: PoolStore::new(SERVER_MAX_CAP),
            listener,
            allow_ip: config.allow_ip(),
            tls: tls_config.map(tls::acceptor),
            socket_opts: SocketOpts {
                nodelay: config.nodelay,
                keepalive: config.keepalive(),
            },
            err_count: AtomicUsize::new(0),
            scope: ManagerScope::new(),
        }
    }

    /// Run the accept loop until the pool is cancelled
    ///
    /// Restartable with the same cancel-and-replace discipline as the
    /// client manager. Accept failures never stop the loop; a closed
    /// listener shows up as repeated failures until cancellation.
    pub async fn run(&self) {
        let token = self.scope.restart();
        info!(allow_ip = ?self.allow_ip, "Server pool manager started");

        let mut accept_failures = 0u32;
        loop {
            let (stream, peer) = tokio::select! {
                _ = token.cancelled() => break,
                result = self.listener.accept() => match result {
                    Ok(pair) => {
                        accept_failures = 0;
                        pair
                    }
                    Err(e) => {
                        if accept_failures == 0 {
                            warn!("Accept failed: {}", e);
                        }
                        accept_failures = accept_failures.saturating_add(1);
                        tokio::task::yield_now().await;
                        continue;
                    }
                },
            };

            if let Err(e) = self.admit(stream, peer, &token).await {
                debug!(%peer, "Candidate dropped: {:#}", e);
            }
        }

        info!("Server pool manager stopped");
    }

    /// Admit one accepted connection into the pool
    ///
    /// Any failure drops the socket; the accept loop carries on.
    async fn admit(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        token: &CancellationToken,
    ) -> Result<()> {
        if let Some(expected) = &self.allow_ip {
            if peer.ip().to_string() != *expected {
                bail!("peer IP {} not allowed", peer.ip());
            }
        }

        // As on the client side, arm keep-alive before any TLS wrap
        if let Err(e) = self.socket_opts.apply(&stream) {
            warn!("Skipping socket options: {}", e);
        }

        let mut conn: PoolConn = match &self.tls {
            Some(acceptor) => {
                let handshake = acceptor.accept(stream);
                let tls_stream = tokio::select! {
                    _ = token.cancelled() => bail!("cancelled during TLS handshake"),
                    result = handshake => result.with_context(|| "TLS handshake failed")?,
                };
                Box::new(tls_stream)
            }
            None => Box::new(stream),
        };

        let minted = id::mint_id();
        // Checked again atomically at publish; this avoids announcing
        // an ID that is already taken
        if self.store.contains(&minted) {
            bail!("minted ID {} collides", minted);
        }

        tokio::select! {
            _ = token.cancelled() => bail!("cancelled while announcing ID"),
            result = id::write_id(&mut conn, &minted) => result?,
        }

        if token.is_cancelled() {
            bail!("cancelled before publish");
        }

        match self.store.register(minted, conn) {
            RegisterOutcome::Registered => {
                debug!(id = %minted, %peer, "Connection pooled");
                Ok(())
            }
            RegisterOutcome::QueueFull => bail!("ready queue full"),
            RegisterOutcome::DuplicateId => bail!("minted ID {} collides", minted),
        }
    }

    /// Take the oldest live warmed connection together with its ID
    ///
    /// Blocks while the queue is empty. Candidates that fail the
    /// liveness probe are closed and the next queue head is tried.
    /// Returns [`PoolError::Cancelled`] when the pool's scope fires
    /// while the caller is blocked.
    pub async fn get(&self) -> Result<(ConnId, PoolConn), PoolError> {
        let token = self.scope.current();

        loop {
            let (id, mut conn) = match self.store.pop_ready_or_wait(&token).await {
                Some(pair) => pair,
                None => return Err(PoolError::Cancelled("pool manager cancelled".to_string())),
            };

            if liveness::probe_silent(&mut conn).await {
                return Ok((id, conn));
            }
            debug!(%id, "Discarding dead pooled connection");
        }
    }

    /// Close every pooled connection and reset the pool
    ///
    /// The manager keeps running and will re-admit new connections.
    pub async fn flush(&self) {
        self.store.flush().await;
    }

    /// Cancel the manager and flush the pool. Idempotent.
    pub async fn close(&self) {
        self.scope.cancel();
        self.store.flush().await;
    }

    /// Whether a manager has been started
    pub fn ready(&self) -> bool {
        self.scope.is_started()
    }

    /// Current ready-queue length
    pub fn active(&self) -> usize {
        self.store.ready_len()
    }

    /// Fixed upper capacity bound
    pub fn max_capacity(&self) -> usize {
        SERVER_MAX_CAP
    }

    /// Advisory error count
    pub fn error_count(&self) -> usize {
        self.err_count.load(Ordering::Relaxed)
    }

    /// Increment the advisory error count
    pub fn add_error(&self) {
        self.err_count.fetch_add(1, Ordering::Relaxed);
    }
}
