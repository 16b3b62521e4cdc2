//! Active health validation at hand-out time
//!
//! Warmed connections are supposed to be silent until they carry real
//! traffic, so a readable byte, EOF or any read error is evidence of
//! trouble. The probe gives the peer one millisecond to betray itself.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Probe read deadline
const PROBE_DEADLINE: Duration = Duration::from_millis(1);

/// Check that a pooled connection is still silently alive
///
/// Attempts a single 1-byte read under a 1 ms deadline. The connection
/// is live iff the read times out: the peer is present but has nothing
/// to say. Every other outcome, readable data, EOF, or a read error,
/// marks it dead.
pub(crate) async fn probe_silent<S: AsyncRead + Unpin + ?Sized>(conn: &mut S) -> bool {
    let mut buf = [0u8; 1];
    tokio::time::timeout(PROBE_DEADLINE, conn.read(&mut buf))
        .await
        .is_err()
}
