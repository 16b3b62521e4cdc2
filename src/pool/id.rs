//! Connection IDs and the 8-byte rendezvous exchange
//!
//! Every warmed connection is keyed by an 8-byte token. The server mints
//! 4 cryptographically random bytes and hex-encodes them to 8 printable
//! characters; the client treats the received bytes as opaque. The token
//! is a rendezvous value, not an authenticator.

use anyhow::{Context, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// An 8-byte connection identifier
///
/// Rendered as ASCII for display. Server-minted IDs are always lowercase
/// hex; client-side IDs are whatever the peer announced.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId([u8; 8]);

impl ConnId {
    /// Length of an ID on the wire
    pub const LEN: usize = 8;

    /// Create an ID from its raw bytes
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        ConnId(bytes)
    }

    /// The raw ID bytes
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnId({})", self)
    }
}

impl From<[u8; 8]> for ConnId {
    fn from(bytes: [u8; 8]) -> Self {
        ConnId(bytes)
    }
}

impl TryFrom<&[u8]> for ConnId {
    type Error = crate::error::PoolError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 8] = bytes.try_into().map_err(|_| {
            crate::error::PoolError::Config(format!(
                "Connection ID must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(ConnId(bytes))
    }
}

/// Mint a fresh ID: 4 random bytes, hex-encoded to 8 ASCII characters
pub(crate) fn mint_id() -> ConnId {
    let mut seed = [0u8; 4];
    OsRng.fill_bytes(&mut seed);

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(hex::encode(seed).as_bytes());
    ConnId(bytes)
}

/// Read the peer-announced ID from a freshly wrapped connection
///
/// Exactly 8 bytes, no framing. A short read abandons the connection.
pub(crate) async fn read_id<S: AsyncRead + Unpin + ?Sized>(conn: &mut S) -> Result<ConnId> {
    let mut buf = [0u8; ConnId::LEN];
    conn.read_exact(&mut buf)
        .await
        .with_context(|| "Failed to read connection ID")?;
    Ok(ConnId(buf))
}

/// Announce an ID to the peer
pub(crate) async fn write_id<S: AsyncWrite + Unpin + ?Sized>(
    conn: &mut S,
    id: &ConnId,
) -> Result<()> {
    conn.write_all(id.as_bytes())
        .await
        .with_context(|| "Failed to write connection ID")?;
    conn.flush()
        .await
        .with_context(|| "Failed to flush connection ID")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_id_is_ascii_hex() {
        for _ in 0..32 {
            let id = mint_id();
            let text = id.to_string();
            assert_eq!(text.len(), 8);
            assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_mint_id_varies() {
        // 4 random bytes colliding 10 times in a row would be remarkable
        let first = mint_id();
        assert!((0..10).any(|_| mint_id() != first));
    }

    #[test]
    fn test_conn_id_round_trip_bytes() {
        let id = ConnId::from_bytes(*b"deadbeef");
        assert_eq!(id.as_bytes(), b"deadbeef");
        assert_eq!(id.to_string(), "deadbeef");
    }

    #[test]
    fn test_conn_id_try_from_slice() {
        let id = ConnId::try_from(b"cafef00d".as_slice()).unwrap();
        assert_eq!(id.to_string(), "cafef00d");

        assert!(ConnId::try_from(b"short".as_slice()).is_err());
        assert!(ConnId::try_from(b"way too long".as_slice()).is_err());
    }

    #[tokio::test]
    async fn test_id_exchange_over_stream() {
        let (mut a, mut b) = tokio::io::duplex(64);

        let id = ConnId::from_bytes(*b"0a1b2c3d");
        write_id(&mut a, &id).await.unwrap();

        let received = read_id(&mut b).await.unwrap();
        assert_eq!(received, id);
    }

    #[tokio::test]
    async fn test_read_id_short_stream_fails() {
        let (mut a, mut b) = tokio::io::duplex(64);

        use tokio::io::AsyncWriteExt;
        a.write_all(b"abc").await.unwrap();
        drop(a);

        assert!(read_id(&mut b).await.is_err());
    }
}
