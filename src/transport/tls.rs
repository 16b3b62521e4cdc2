//! TLS wrapping for pooled connections
//!
//! Implements the three-step security ladder using rustls (pure Rust,
//! easy static linking): mode "0" keeps the plain socket, mode "1"
//! encrypts without certificate verification, mode "2" encrypts and
//! verifies the certificate chain and hostname. Both TLS modes pin the
//! protocol floor to TLS 1.3.

use std::sync::Arc;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tracing::warn;

use crate::error::PoolError;

/// TLS security mode for client-side wrapping
///
/// Parsed from the single-character mode codes used on the wire between
/// peers. Unrecognized codes fall back to [`TlsMode::Off`], matching the
/// behavior tunnels in the wild rely on; the fallback is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// No TLS, the raw socket is used as-is
    Off,
    /// TLS with certificate verification disabled
    Insecure,
    /// TLS with certificate and hostname verification
    Verify,
}

impl TlsMode {
    /// Parse a TLS mode code
    pub fn from_code(code: &str) -> Self {
        match code {
            "0" => TlsMode::Off,
            "1" => TlsMode::Insecure,
            "2" => TlsMode::Verify,
            other => {
                warn!("Unknown TLS mode code {:?}, falling back to no TLS", other);
                TlsMode::Off
            }
        }
    }
}

/// Build a connector that skips certificate verification
///
/// Used by mode "1". The peer is expected to present a self-signed
/// certificate; the session is encrypted but not authenticated.
pub fn insecure_connector() -> TlsConnector {
    let config = ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerifier))
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Build a connector that verifies against the platform root store
///
/// Used by mode "2". Certificates that fail chain or hostname
/// verification abort the handshake and the connection is dropped.
pub fn verifying_connector() -> TlsConnector {
    let mut root_store = RootCertStore::empty();
    let native_certs = rustls_native_certs::load_native_certs();
    for cert in native_certs.certs {
        root_store.add(cert).ok();
    }

    let config = ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Build the server-side acceptor from an opaque TLS server config
pub fn acceptor(config: Arc<ServerConfig>) -> TlsAcceptor {
    TlsAcceptor::from(config)
}

/// Parse the expected server name for the TLS handshake
///
/// An empty hostname falls back to `localhost` so that mode "1" works
/// against peers addressed only by IP.
pub fn server_name(hostname: &str) -> Result<ServerName<'static>, PoolError> {
    let name = if hostname.is_empty() {
        "localhost"
    } else {
        hostname
    };

    ServerName::try_from(name.to_string())
        .map_err(|_| PoolError::Config(format!("Invalid hostname: {}", name)))
}

/// Certificate verifier that accepts all certificates (dangerous!)
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
