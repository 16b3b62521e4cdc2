//! Client pool configuration
//!
//! Defines the knobs for the dialing side: capacity bounds, refill
//! interval bounds, keep-alive period and the TLS security mode.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default minimum ready-queue capacity
fn default_min_cap() -> usize {
    2
}

/// Default maximum ready-queue capacity
fn default_max_cap() -> usize {
    8
}

/// Default minimum refill interval in milliseconds
fn default_min_interval_ms() -> u64 {
    1000
}

/// Default maximum refill interval in milliseconds
fn default_max_interval_ms() -> u64 {
    5000
}

/// Default TCP keep-alive period in seconds
fn default_keepalive_secs() -> u64 {
    20
}

/// Default TLS mode code (no TLS)
fn default_tls_code() -> String {
    "0".to_string()
}

/// Default TCP_NODELAY setting
fn default_nodelay() -> bool {
    true
}

/// Client pool configuration
///
/// All fields are normalized before use: capacities are clamped to at
/// least 1 and swapped if inverted, intervals default to one second when
/// zero and are swapped if inverted.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientPoolConfig {
    /// Minimum target capacity of the ready queue
    #[serde(default = "default_min_cap")]
    pub min_cap: usize,

    /// Maximum target capacity of the ready queue
    #[serde(default = "default_max_cap")]
    pub max_cap: usize,

    /// Minimum delay between refill sweeps in milliseconds
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Maximum delay between refill sweeps in milliseconds
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// TCP keep-alive period in seconds, 0 disables keep-alive
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Enable TCP_NODELAY on dialed connections
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,

    /// TLS mode code: "0" none, "1" encrypt without verification,
    /// "2" encrypt and verify the server certificate and hostname.
    /// Any other value falls back to "0".
    #[serde(default = "default_tls_code")]
    pub tls_code: String,

    /// Expected server hostname, used by TLS mode "2"
    #[serde(default)]
    pub hostname: String,
}

impl Default for ClientPoolConfig {
    fn default() -> Self {
        ClientPoolConfig {
            min_cap: default_min_cap(),
            max_cap: default_max_cap(),
            min_interval_ms: default_min_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            keepalive_secs: default_keepalive_secs(),
            nodelay: default_nodelay(),
            tls_code: default_tls_code(),
            hostname: String::new(),
        }
    }
}

/// Normalized capacity and interval bounds used by the refill loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tunables {
    /// Lower capacity bound, at least 1
    pub(crate) min_cap: usize,
    /// Upper capacity bound, at least `min_cap`
    pub(crate) max_cap: usize,
    /// Lower refill interval bound
    pub(crate) min_ivl: Duration,
    /// Upper refill interval bound
    pub(crate) max_ivl: Duration,
}

impl ClientPoolConfig {
    /// Normalize the configured bounds
    ///
    /// Capacities below 1 become 1 and an inverted pair is swapped.
    /// Intervals of zero become one second and an inverted pair is
    /// swapped. The result always satisfies `min_cap <= max_cap` and
    /// `min_ivl <= max_ivl`.
    pub(crate) fn normalize(&self) -> Tunables {
        let mut min_cap = self.min_cap.max(1);
        let mut max_cap = self.max_cap.max(1);
        if min_cap > max_cap {
            std::mem::swap(&mut min_cap, &mut max_cap);
        }

        let mut min_ivl = if self.min_interval_ms == 0 {
            Duration::from_secs(1)
        } else {
            Duration::from_millis(self.min_interval_ms)
        };
        let mut max_ivl = if self.max_interval_ms == 0 {
            Duration::from_secs(1)
        } else {
            Duration::from_millis(self.max_interval_ms)
        };
        if min_ivl > max_ivl {
            std::mem::swap(&mut min_ivl, &mut max_ivl);
        }

        Tunables {
            min_cap,
            max_cap,
            min_ivl,
            max_ivl,
        }
    }

    /// TCP keep-alive period, `None` when disabled
    pub(crate) fn keepalive(&self) -> Option<Duration> {
        if self.keepalive_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.keepalive_secs))
        }
    }
}
