//! Exchange state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Name the states an exchange moves through
//! - Generate unique exchange IDs for tracing
//! - Count in-flight exchanges and tunnels so shutdown can drain them
//!
//! # States
//! ```text
//! Received → Filtered → Forwarding → Completed
//!                │             ├───→ Upgraded → StreamClosed
//!                │             └───→ Failed
//!                └──────────────────→ Completed   (health check, preflight)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Global atomic counter for exchange IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static EXCHANGE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(u64);

impl ExchangeId {
    /// Generate a new unique exchange ID.
    pub fn new() -> Self {
        Self(EXCHANGE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ex-{}", self.0)
    }
}

/// Where an exchange is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Received,
    Filtered,
    Forwarding,
    Completed,
    Upgraded,
    StreamClosed,
    Failed,
}

impl ExchangeState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: ExchangeState) -> bool {
        use ExchangeState::*;
        matches!(
            (self, next),
            (Received, Filtered)
                | (Filtered, Forwarding)
                | (Filtered, Completed)
                | (Forwarding, Completed)
                | (Forwarding, Upgraded)
                | (Forwarding, Failed)
                | (Upgraded, StreamClosed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExchangeState::Completed | ExchangeState::StreamClosed | ExchangeState::Failed
        )
    }
}

/// Tracks in-flight exchanges for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ExchangeTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    active_count: AtomicU64,
    idle: Notify,
}

impl ExchangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new exchange in state `Received`. The guard decrements on drop.
    pub fn track(&self) -> ExchangeGuard {
        self.track_from(ExchangeId::new(), ExchangeState::Received)
    }

    /// Record an upgraded tunnel continuing exchange `id`.
    pub fn track_tunnel(&self, id: ExchangeId) -> ExchangeGuard {
        self.track_from(id, ExchangeState::Upgraded)
    }

    fn track_from(&self, id: ExchangeId, state: ExchangeState) -> ExchangeGuard {
        self.inner.active_count.fetch_add(1, Ordering::SeqCst);
        ExchangeGuard {
            tracker: Arc::clone(&self.inner),
            id,
            state,
        }
    }

    /// Get current in-flight count.
    pub fn active_count(&self) -> u64 {
        self.inner.active_count.load(Ordering::SeqCst)
    }

    /// Wait until nothing is in flight or `timeout` elapses. Returns whether it drained.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.inner.idle.notified();
                if self.active_count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

/// Guard that tracks one exchange (or tunnel) and its state.
#[derive(Debug)]
pub struct ExchangeGuard {
    tracker: Arc<TrackerInner>,
    id: ExchangeId,
    state: ExchangeState,
}

impl ExchangeGuard {
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Move to `next`. Illegal transitions are logged and ignored.
    pub fn advance(&mut self, next: ExchangeState) -> bool {
        if !self.state.can_advance_to(next) {
            tracing::warn!(
                exchange_id = %self.id,
                from = ?self.state,
                to = ?next,
                "Ignoring illegal exchange transition"
            );
            return false;
        }
        tracing::trace!(exchange_id = %self.id, from = ?self.state, to = ?next, "Exchange transition");
        self.state = next;
        true
    }
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        if self.tracker.active_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.idle.notify_waiters();
        }
        tracing::trace!(exchange_id = %self.id, state = ?self.state, "Exchange closed");
    }
}
