//! Server pool configuration
//!
//! The accepting side has far fewer knobs than the dialing side: an
//! optional client-IP allow value and the keep-alive period. Capacity is
//! fixed, the server never tunes itself.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed ready-queue capacity of a server pool
pub const SERVER_MAX_CAP: usize = 65536;

/// Default TCP keep-alive period in seconds
fn default_keepalive_secs() -> u64 {
    20
}

/// Default TCP_NODELAY setting
fn default_nodelay() -> bool {
    true
}

/// Server pool configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerPoolConfig {
    /// Only accept connections whose remote IP matches this textual
    /// value. `None` or an empty string disables the restriction.
    #[serde(default)]
    pub client_ip: Option<String>,

    /// TCP keep-alive period in seconds, 0 disables keep-alive
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Enable TCP_NODELAY on accepted connections
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,
}

impl Default for ServerPoolConfig {
    fn default() -> Self {
        ServerPoolConfig {
            client_ip: None,
            keepalive_secs: default_keepalive_secs(),
            nodelay: default_nodelay(),
        }
    }
}

impl ServerPoolConfig {
    /// The configured allow-IP, with the empty string treated as unset
    pub(crate) fn allow_ip(&self) -> Option<String> {
        match &self.client_ip {
            Some(ip) if !ip.is_empty() => Some(ip.clone()),
            _ => None,
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
