//! Pool store: registry plus ready queue
//!
//! The same warmed connection is reachable by ID through the registry
//! and by position through the bounded FIFO ready queue. The two are
//! kept mutually consistent: an ID is queued iff its connection is
//! registered and not yet handed out. Compound operations take the
//! queue lock, so publishes, keyed evictions and flushes serialize.

use super::id::ConnId;
use crate::transport::PoolConn;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Result of publishing a warmed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegisterOutcome {
    /// The connection is now ready for hand-out
    Registered,
    /// The ready queue was full, the connection was dropped
    QueueFull,
    /// The ID was already registered, the connection was dropped
    DuplicateId,
}

/// Registry and ready queue for one pool
pub(crate) struct PoolStore {
    /// ID to connection mapping
    registry: DashMap<ConnId, PoolConn>,
    /// FIFO of ready IDs, bounded by `max_cap`
    ready: Mutex<VecDeque<ConnId>>,
    /// Queue length mirror for lock-free telemetry reads
    ready_len: AtomicUsize,
    /// Wakes consumers blocked on an empty queue
    available: Notify,
    /// Hard bound on the ready queue
    max_cap: usize,
}

impl PoolStore {
    pub(crate) fn new(max_cap: usize) -> Self {
        PoolStore {
            registry: DashMap::new(),
            ready: Mutex::new(VecDeque::new()),
            ready_len: AtomicUsize::new(0),
            available: Notify::new(),
            max_cap,
        }
    }

    /// Current ready-queue length
    pub(crate) fn ready_len(&self) -> usize {
        self.ready_len.load(Ordering::Relaxed)
    }

    /// Whether an ID is currently registered
    pub(crate) fn contains(&self, id: &ConnId) -> bool {
        self.registry.contains_key(id)
    }

    /// Atomically publish a warmed connection
    ///
    /// Fails with back-pressure when the queue is full and with a
    /// collision when the ID is already present; in both cases the
    /// connection is dropped here.
    pub(crate) fn register(&self, id: ConnId, conn: PoolConn) -> RegisterOutcome {
        let mut ready = self.ready.lock().unwrap();

        if ready.len() >= self.max_cap {
            return RegisterOutcome::QueueFull;
        }
        if self.registry.contains_key(&id) {
            return RegisterOutcome::DuplicateId;
        }

        self.registry.insert(id, conn);
        ready.push_back(id);
        self.ready_len.store(ready.len(), Ordering::Relaxed);
        drop(ready);

        self.available.notify_one();
        RegisterOutcome::Registered
    }

    /// Keyed hand-out: remove the connection for `id` from registry and
    /// queue in one step
    ///
    /// Non-blocking; absence is a miss, not an error. The queue is
    /// filtered in place, preserving the relative order of survivors.
    pub(crate) fn take_by_id(&self, id: ConnId) -> Option<PoolConn> {
        let mut ready = self.ready.lock().unwrap();

        let (_, conn) = self.registry.remove(&id)?;
        ready.retain(|queued| *queued != id);
        self.ready_len.store(ready.len(), Ordering::Relaxed);
        Some(conn)
    }

    /// Pop the oldest ready connection, if any
    pub(crate) fn pop_ready(&self) -> Option<(ConnId, PoolConn)> {
        let mut ready = self.ready.lock().unwrap();

        while let Some(id) = ready.pop_front() {
            self.ready_len.store(ready.len(), Ordering::Relaxed);
            if let Some((id, conn)) = self.registry.remove(&id) {
                return Some((id, conn));
            }
        }
        None
    }

    /// Pop the oldest ready connection, waiting for one to arrive
    ///
    /// Returns `None` only when `token` fires while the queue is empty.
    pub(crate) async fn pop_ready_or_wait(
        &self,
        token: &CancellationToken,
    ) -> Option<(ConnId, PoolConn)> {
        loop {
            // Register interest before checking, so a publish between
            // the check and the await is not lost
            let available = self.available.notified();

            if let Some(pair) = self.pop_ready() {
                return Some(pair);
            }

            tokio::select! {
                _ = token.cancelled() => return None,
                _ = available => {}
            }
        }
    }

    /// Close every registered connection and reset the store
    ///
    /// Connections are shut down concurrently and all closers are
    /// joined before returning. Safe to call repeatedly.
    pub(crate) async fn flush(&self) {
        let drained: Vec<PoolConn> = {
            let mut ready = self.ready.lock().unwrap();
            ready.clear();
            self.ready_len.store(0, Ordering::Relaxed);

            let ids: Vec<ConnId> = self.registry.iter().map(|entry| *entry.key()).collect();
            ids.into_iter()
                .filter_map(|id| self.registry.remove(&id).map(|(_, conn)| conn))
                .collect()
        };

        if drained.is_empty() {
            return;
        }
        debug!("Flushing {} pooled connections", drained.len());

        let mut closers = Vec::with_capacity(drained.len());
        for mut conn in drained {
            closers.push(tokio::spawn(async move {
                let _ = conn.shutdown().await;
            }));
        }
        for closer in closers {
            let _ = closer.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn mock_conn() -> (PoolConn, DuplexStream) {
        let (near, far) = tokio::io::duplex(64);
        (Box::new(near), far)
    }

    fn id(text: &[u8; 8]) -> ConnId {
        ConnId::from_bytes(*text)
    }

    #[tokio::test]
    async fn test_register_and_active() {
        let store = PoolStore::new(4);
        assert_eq!(store.ready_len(), 0);

        let (conn, _far) = mock_conn();
        assert_eq!(
            store.register(id(b"00000001"), conn),
            RegisterOutcome::Registered
        );
        assert_eq!(store.ready_len(), 1);
        assert!(store.contains(&id(b"00000001")));
        assert_eq!(store.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_register_backpressure_when_full() {
        let store = PoolStore::new(2);
        let (c1, _f1) = mock_conn();
        let (c2, _f2) = mock_conn();
        let (c3, _f3) = mock_conn();

        store.register(id(b"00000001"), c1);
        store.register(id(b"00000002"), c2);
        assert_eq!(
            store.register(id(b"00000003"), c3),
            RegisterOutcome::QueueFull
        );

        assert_eq!(store.ready_len(), 2);
        assert!(!store.contains(&id(b"00000003")));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_id() {
        let store = PoolStore::new(4);
        let (c1, _f1) = mock_conn();
        let (c2, _f2) = mock_conn();

        assert_eq!(
            store.register(id(b"deadbeef"), c1),
            RegisterOutcome::Registered
        );
        assert_eq!(
            store.register(id(b"deadbeef"), c2),
            RegisterOutcome::DuplicateId
        );

        // The pool advanced by one, not two
        assert_eq!(store.ready_len(), 1);
        assert_eq!(store.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_take_by_id_removes_from_both() {
        let store = PoolStore::new(4);
        let (c1, _f1) = mock_conn();
        store.register(id(b"00000001"), c1);

        assert!(store.take_by_id(id(b"00000001")).is_some());
        assert_eq!(store.ready_len(), 0);
        assert_eq!(store.registry.len(), 0);

        // Second take is a miss
        assert!(store.take_by_id(id(b"00000001")).is_none());
    }

    #[tokio::test]
    async fn test_take_by_id_preserves_survivor_order() {
        let store = PoolStore::new(4);
        let (c1, _f1) = mock_conn();
        let (c2, _f2) = mock_conn();
        let (c3, _f3) = mock_conn();

        store.register(id(b"00000001"), c1);
        store.register(id(b"00000002"), c2);
        store.register(id(b"00000003"), c3);

        assert!(store.take_by_id(id(b"00000002")).is_some());

        let (first, _) = store.pop_ready().unwrap();
        let (second, _) = store.pop_ready().unwrap();
        assert_eq!(first, id(b"00000001"));
        assert_eq!(second, id(b"00000003"));
    }

    #[tokio::test]
    async fn test_pop_ready_is_fifo() {
        let store = PoolStore::new(4);
        let (c1, _f1) = mock_conn();
        let (c2, _f2) = mock_conn();

        store.register(id(b"00000001"), c1);
        store.register(id(b"00000002"), c2);

        assert_eq!(store.pop_ready().unwrap().0, id(b"00000001"));
        assert_eq!(store.pop_ready().unwrap().0, id(b"00000002"));
        assert!(store.pop_ready().is_none());
    }

    #[tokio::test]
    async fn test_registry_and_queue_stay_consistent() {
        let store = PoolStore::new(8);
        for i in 0..5u8 {
            let (conn, far) = mock_conn();
            std::mem::forget(far);
            let mut bytes = *b"0000000_";
            bytes[7] = b'0' + i;
            store.register(ConnId::from_bytes(bytes), conn);
        }
        assert_eq!(store.registry.len(), store.ready_len());

        store.take_by_id(id(b"00000002"));
        assert_eq!(store.registry.len(), store.ready_len());

        store.pop_ready();
        assert_eq!(store.registry.len(), store.ready_len());
    }

    #[tokio::test]
    async fn test_pop_ready_or_wait_returns_none_on_cancel() {
        let store = PoolStore::new(4);
        let token = CancellationToken::new();

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            cancel.cancel();
        });

        assert!(store.pop_ready_or_wait(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_pop_ready_or_wait_wakes_on_register() {
        let store = std::sync::Arc::new(PoolStore::new(4));
        let token = CancellationToken::new();

        let producer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            let (conn, far) = mock_conn();
            std::mem::forget(far);
            producer.register(id(b"00000001"), conn);
        });

        let (taken, _conn) = store.pop_ready_or_wait(&token).await.unwrap();
        assert_eq!(taken, id(b"00000001"));
    }

    #[tokio::test]
    async fn test_flush_closes_and_resets() {
        let store = PoolStore::new(4);
        let (c1, mut f1) = mock_conn();
        store.register(id(b"00000001"), c1);

        store.flush().await;
        assert_eq!(store.ready_len(), 0);
        assert_eq!(store.registry.len(), 0);

        // The far side observes the close
        let mut buf = [0u8; 1];
        assert_eq!(f1.read(&mut buf).await.unwrap(), 0);

        // Repeated flush is a no-op
        store.flush().await;
        assert_eq!(store.ready_len(), 0);
    }
}
