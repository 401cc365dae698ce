//! Connection admission with limits.
//!
//! Provides a global connection cap with RAII guards so a flood of clients
//! cannot spawn unbounded handler tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Configuration for the connection admission gate.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub max_connections: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_connections: 64,
        }
    }
}

/// Global connection gate with atomic counting.
pub struct ConnectionPool {
    active: AtomicUsize,
    config: ConnectionConfig,
}

impl ConnectionPool {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            active: AtomicUsize::new(0),
            config,
        }
    }

    /// Try to acquire a connection slot. Returns a guard if available.
    pub fn try_acquire(&self) -> Option<ConnectionGuard<'_>> {
        if self.acquire_slot() {
            Some(ConnectionGuard { pool: self })
        } else {
            None
        }
    }

    /// Owned variant for handler tasks that outlive the accept loop's stack.
    pub fn try_acquire_owned(self: &Arc<Self>) -> Option<OwnedConnectionGuard> {
        if self.acquire_slot() {
            Some(OwnedConnectionGuard {
                pool: Arc::clone(self),
            })
        } else {
            None
        }
    }

    fn acquire_slot(&self) -> bool {
        loop {
            let current = self.active.load(Ordering::Relaxed);
            if current >= self.config.max_connections {
                return false;
            }

            // CAS to atomically increment
            if self
                .active
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
            // CAS failed, retry
        }
    }

    /// Current number of active connections.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Maximum allowed connections.
    pub fn max_connections(&self) -> usize {
        self.config.max_connections
    }

    fn release(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// RAII guard that releases the slot on drop.
pub struct ConnectionGuard<'a> {
    pool: &'a ConnectionPool,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.pool.release();
    }
}

/// Owned RAII guard for spawned tasks.
pub struct OwnedConnectionGuard {
    pool: Arc<ConnectionPool>,
}

impl Drop for OwnedConnectionGuard {
    fn drop(&mut self) {
        self.pool.release();
    }
}
