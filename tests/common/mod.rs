//! Test utilities for warmpool integration tests
//!
//! Loopback listeners, instrumented dialers and self-signed TLS
//! material shared by the end-to-end scenarios.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls::pki_types::PrivateKeyDer;
use tokio_rustls::rustls::ServerConfig;
use warmpool::Dialer;

/// Create a test TCP listener on an available loopback port
pub async fn bind_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Poll a condition until it holds or the deadline passes
pub async fn wait_until<F: FnMut() -> bool>(deadline: Duration, mut cond: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Dialer that counts invocations and can be switched to fail
pub struct CountingDialer {
    addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl CountingDialer {
    pub fn new(addr: SocketAddr) -> Self {
        CountingDialer {
            addr,
            calls: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle to the invocation counter
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Handle to the failure switch
    pub fn fail_switch(&self) -> Arc<AtomicBool> {
        self.fail.clone()
    }
}

#[async_trait]
impl Dialer for CountingDialer {
    async fn dial(&self) -> anyhow::Result<TcpStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("dialing disabled by test");
        }
        Ok(TcpStream::connect(self.addr).await?)
    }
}

/// Dialer that fails every call
pub struct FailingDialer {
    calls: Arc<AtomicUsize>,
}

impl FailingDialer {
    pub fn new() -> Self {
        FailingDialer {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Dialer for FailingDialer {
    async fn dial(&self) -> anyhow::Result<TcpStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("no route to host")
    }
}

/// Build a rustls server config with a fresh self-signed certificate
/// valid for the given DNS names
pub fn self_signed_config(domains: &[&str]) -> Arc<ServerConfig> {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let params = rcgen::CertificateParams::new(
        domains.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
    )
    .unwrap();
    let cert = params.self_signed(&key_pair).unwrap();

    let cert_der = cert.der().clone();
    let key_der = PrivateKeyDer::try_from(key_pair.serialize_der()).unwrap();

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der)
        .unwrap();
    Arc::new(config)
}
