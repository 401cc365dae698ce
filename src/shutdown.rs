//! Graceful shutdown coordination.
//!
//! Tracks in-flight connections so the daemon can drain them before exit
//! instead of cutting clients off mid-response.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const RUNNING: u8 = 0;
const DRAINING: u8 = 1;
const STOPPED: u8 = 2;

/// Shutdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

/// Result of a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    Timeout { remaining: u32 },
}

/// Coordinates shutdown between the accept loop and handler tasks.
///
/// The listener asks for a [`ShutdownGuard`] per connection; once
/// [`initiate`](Self::initiate) flips the state, new connections are
/// refused and the call waits for outstanding guards to drop.
pub struct ShutdownCoordinator {
    state: AtomicU8,
    in_flight: Arc<AtomicU32>,
    drained: Arc<Notify>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
            in_flight: Arc::new(AtomicU32::new(0)),
            drained: Arc::new(Notify::new()),
        }
    }

    pub fn state(&self) -> ShutdownState {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => ShutdownState::Running,
            DRAINING => ShutdownState::Draining,
            _ => ShutdownState::Stopped,
        }
    }

    /// Whether new connections may still be admitted.
    pub fn is_accepting(&self) -> bool {
        self.state.load(Ordering::SeqCst) == RUNNING
    }

    /// Track an in-flight connection. Returns None once draining started.
    pub fn track(&self) -> Option<ShutdownGuard> {
        if !self.is_accepting() {
            return None;
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(ShutdownGuard {
            counter: Arc::clone(&self.in_flight),
            drained: Arc::clone(&self.drained),
        })
    }

    pub fn in_flight_count(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop admitting connections, then wait up to `timeout` for in-flight
    /// ones to finish.
    pub async fn initiate(&self, timeout: Duration) -> ShutdownResult {
        self.state.store(DRAINING, Ordering::SeqCst);
        let result = self.wait_for_drain(timeout).await;
        self.state.store(STOPPED, Ordering::SeqCst);
        result
    }

    async fn wait_for_drain(&self, timeout: Duration) -> ShutdownResult {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let count = self.in_flight_count();
            if count == 0 {
                return ShutdownResult::Complete;
            }

            let remaining_time = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining_time.is_zero() {
                return ShutdownResult::Timeout { remaining: count };
            }

            tokio::select! {
                _ = self.drained.notified() => {}
                _ = tokio::time::sleep(remaining_time) => {
                    let remaining = self.in_flight_count();
                    if remaining == 0 {
                        return ShutdownResult::Complete;
                    }
                    return ShutdownResult::Timeout { remaining };
                }
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for in-flight connection tracking.
pub struct ShutdownGuard {
    counter: Arc<AtomicU32>,
    drained: Arc<Notify>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        self.drained.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_running() {
        let coord = ShutdownCoordinator::new();
        assert_eq!(coord.state(), ShutdownState::Running);
        assert!(coord.is_accepting());
    }

    #[test]
    fn test_track_counts_in_flight() {
        let coord = ShutdownCoordinator::new();
        let g1 = coord.track().unwrap();
        let g2 = coord.track().unwrap();
        assert_eq!(coord.in_flight_count(), 2);
        drop(g1);
        assert_eq!(coord.in_flight_count(), 1);
        drop(g2);
        assert_eq!(coord.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_drain_completes_when_idle() {
        let coord = ShutdownCoordinator::new();
        let result = coord.initiate(Duration::from_millis(100)).await;
        assert_eq!(result, ShutdownResult::Complete);
        assert_eq!(coord.state(), ShutdownState::Stopped);
    }

    #[tokio::test]
    async fn test_drain_times_out_with_stuck_connection() {
        let coord = ShutdownCoordinator::new();
        let _stuck = coord.track().unwrap();
        let result = coord.initiate(Duration::from_millis(50)).await;
        assert_eq!(result, ShutdownResult::Timeout { remaining: 1 });
    }

    #[tokio::test]
    async fn test_no_tracking_while_draining() {
        let coord = Arc::new(ShutdownCoordinator::new());
        let guard = coord.track().unwrap();

        let c = Arc::clone(&coord);
        let drain = tokio::spawn(async move { c.initiate(Duration::from_secs(2)).await });

        // Give initiate() time to flip the state, then release the guard.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(coord.track().is_none());
        drop(guard);

        assert_eq!(drain.await.unwrap(), ShutdownResult::Complete);
    }
}
