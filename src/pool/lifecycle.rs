//! Restartable manager lifecycle
//!
//! Each pool owns one cancellation scope that gates its long-running
//! loop and any blocked hand-out call. Starting a manager again cancels
//! the previous scope and installs a fresh one, so at most one loop is
//! ever live per pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Cancellation scope shared by a pool's manager and hand-out calls
#[derive(Debug)]
pub(crate) struct ManagerScope {
    /// The active token, replaced on every restart
    token: Mutex<CancellationToken>,
    /// Set once the first manager has started
    started: AtomicBool,
}

impl ManagerScope {
    pub(crate) fn new() -> Self {
        ManagerScope {
            token: Mutex::new(CancellationToken::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Cancel any previous scope and begin a fresh one
    ///
    /// Returns the token the new manager iteration must observe.
    pub(crate) fn restart(&self) -> CancellationToken {
        let mut guard = self.token.lock().unwrap();
        guard.cancel();
        *guard = CancellationToken::new();
        self.started.store(true, Ordering::SeqCst);
        guard.clone()
    }

    /// The token currently in force
    pub(crate) fn current(&self) -> CancellationToken {
        self.token.lock().unwrap().clone()
    }

    /// Cancel the current scope without starting a new one
    pub(crate) fn cancel(&self) {
        self.token.lock().unwrap().cancel();
    }

    /// Whether a manager has ever been started
    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}
