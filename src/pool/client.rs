//! Client-side pool: dials ahead of demand
//!
//! The refill loop keeps the ready queue filled to an adaptive target
//! capacity. Every sweep tunes the interval from consumption pressure,
//! dials the deficit, tunes the capacity from the success ratio, then
//! sleeps. Hand-out is keyed: the caller quotes the rendezvous ID it
//! learned out-of-band and either gets the connection or a miss.

use crate::config::{ClientPoolConfig, Tunables};
use crate::error::PoolError;
use crate::pool::id::{self, ConnId};
use crate::pool::lifecycle::ManagerScope;
use crate::pool::store::{PoolStore, RegisterOutcome};
use crate::pool::tuning;
use crate::transport::tls::{self, TlsMode};
use crate::transport::{Dialer, PoolConn, SocketOpts};
use anyhow::{bail, Context, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Client-side TLS wrapping, resolved once at construction
enum ClientTls {
    /// Mode "0": keep the plain socket
    Off,
    /// Modes "1" and "2": wrap and handshake before the ID exchange
    Tls {
        connector: TlsConnector,
        server_name: ServerName<'static>,
    },
}

/// The dialing half of a warm connection pool
pub struct ClientPool {
    store: PoolStore,
    dialer: Arc<dyn Dialer>,
    tls: ClientTls,
    socket_opts: SocketOpts,
    tunables: Tunables,
    /// Current target fill level, tuned by the refill loop
    capacity: AtomicUsize,
    /// Current inter-sweep delay in milliseconds, tuned by the refill loop
    interval_ms: AtomicU64,
    /// Externally incremented, advisory only
    err_count: AtomicUsize,
    scope: ManagerScope,
}

impl ClientPool {
    /// Create a client pool
    ///
    /// Capacity and interval bounds are normalized (clamped, swapped if
    /// inverted); the pool starts at the minimum capacity and the
    /// minimum interval. Fails only when a TLS mode is configured with a
    /// hostname that cannot be used for server name verification.
    pub fn new(config: ClientPoolConfig, dialer: Arc<dyn Dialer>) -> Result<Self, PoolError> {
        let tunables = config.normalize();

        let tls = match TlsMode::from_code(&config.tls_code) {
            TlsMode::Off => ClientTls::Off,
            TlsMode::Insecure => ClientTls::Tls {
                connector: tls::insecure_connector(),
                server_name: tls::server_name(&config.hostname)?,
            },
            TlsMode::Verify => ClientTls::Tls {
                connector: tls::verifying_connector(),
                server_name: tls::server_name(&config.hostname)?,
            },
        };

        Ok(ClientPool {
            store: PoolStore::new(tunables.max_cap),
            dialer,
            tls,
            socket_opts: SocketOpts {
                nodelay: config.nodelay,
                keepalive: config.keepalive(),
            },
            capacity: AtomicUsize::new(tunables.min_cap),
            interval_ms: AtomicU64::new(tunables.min_ivl.as_millis() as u64),
            err_count: AtomicUsize::new(0),
            scope: ManagerScope::new(),
            tunables,
        })
    }

    /// Run the refill loop until the pool is cancelled
    ///
    /// Restartable: a second call cancels the scope of the first, which
    /// returns promptly, and the new call becomes the sole active loop.
    pub async fn run(&self) {
        let token = self.scope.restart();
        info!(
            min_cap = self.tunables.min_cap,
            max_cap = self.tunables.max_cap,
            "Client pool manager started"
        );

        loop {
            if token.is_cancelled() {
                break;
            }

            self.tune_interval();
            let created = self.fill(&token).await;
            self.tune_capacity(created);

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval()) => {}
            }
        }

        info!("Client pool manager stopped");
    }

    /// One fill phase: dial until the queue reaches the target capacity
    ///
    /// Budgets one attempt per capacity slot so a failing dialer cannot
    /// pin the sweep; failed attempts surface only through the success
    /// ratio fed to the capacity controller.
    async fn fill(&self, token: &CancellationToken) -> usize {
        let capacity = self.capacity();
        let mut created = 0;
        let mut attempts = 0;

        while self.store.ready_len() < capacity && attempts < capacity {
            if token.is_cancelled() {
                break;
            }
            attempts += 1;

            match self.warm_one(token).await {
                Ok((id, conn)) => match self.store.register(id, conn) {
                    RegisterOutcome::Registered => created += 1,
                    outcome => debug!(?outcome, %id, "Dropped warmed connection"),
                },
                Err(e) => debug!("Warm attempt failed: {:#}", e),
            }
        }

        created
    }

    /// Dial and warm a single connection
    ///
    /// dial, arm keep-alive on the raw socket, wrap per the TLS mode,
    /// then read the 8-byte ID the server announces.
    async fn warm_one(&self, token: &CancellationToken) -> Result<(ConnId, PoolConn)> {
        let stream = tokio::select! {
            _ = token.cancelled() => bail!("cancelled while dialing"),
            result = self.dialer.dial() => result.with_context(|| "Dial failed")?,
        };

        // Keep-alive must be armed before a TLS wrap hides the TCP
        // layer; if it cannot be armed, skip it rather than fail
        if let Err(e) = self.socket_opts.apply(&stream) {
            warn!("Skipping socket options: {}", e);
        }

        let mut conn: PoolConn = match &self.tls {
            ClientTls::Off => Box::new(stream),
            ClientTls::Tls {
                connector,
                server_name,
            } => {
                let handshake = connector.connect(server_name.clone(), stream);
                let tls_stream = tokio::select! {
                    _ = token.cancelled() => bail!("cancelled during TLS handshake"),
                    result = handshake => result.with_context(|| "TLS handshake failed")?,
                };
                Box::new(tls_stream)
            }
        };

        let id = tokio::select! {
            _ = token.cancelled() => bail!("cancelled while reading ID"),
            result = id::read_id(&mut conn) => result?,
        };

        if token.is_cancelled() {
            bail!("cancelled before publish");
        }

        Ok((id, conn))
    }

    fn tune_interval(&self) {
        let idle = self.store.ready_len();
        let next = tuning::next_interval(
            idle,
            self.capacity(),
            self.interval(),
            self.tunables.min_ivl,
            self.tunables.max_ivl,
        );
        self.interval_ms
            .store(next.as_millis() as u64, Ordering::Relaxed);
    }

    fn tune_capacity(&self, created: usize) {
        let next = tuning::next_capacity(
            created,
            self.capacity(),
            self.tunables.min_cap,
            self.tunables.max_cap,
        );
        self.capacity.store(next, Ordering::Relaxed);
    }

    /// Claim the warmed connection for `id`
    ///
    /// Synchronous and non-blocking: either the connection has been
    /// published and is returned, or the call is a miss. Ownership
    /// transfers to the caller; the connection never returns to the
    /// pool.
    pub fn get(&self, id: ConnId) -> Option<PoolConn> {
        self.store.take_by_id(id)
    }

    /// Close every pooled connection and reset the pool
    ///
    /// The manager keeps running and will refill.
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

    /// Current target capacity
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Upper capacity bound
    pub fn max_capacity(&self) -> usize {
        self.tunables.max_cap
    }

    /// Current delay between refill sweeps
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
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
