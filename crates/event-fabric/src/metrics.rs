//! Fabric counters.
//!
//! Lightweight atomics shared between the relay actor and whatever
//! wants to report on it. Prometheus exposition happens at the service
//! layer; these stay cheap enough to bump on every event.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared relay metrics.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Currently registered connections.
    connections_active: AtomicUsize,
    /// Connections registered since start.
    connections_total: AtomicU64,
    /// Publish commands processed.
    events_published: AtomicU64,
    /// Envelopes handed to connection channels.
    events_delivered: AtomicU64,
    /// Envelopes dropped (slow or closed connection channel).
    events_dropped: AtomicU64,
}

impl RelayMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        // Saturating: a double-disconnect must not underflow.
        let _ = self
            .connections_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    pub(crate) fn record_publish(&self, delivered: usize, dropped: usize) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.events_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.events_dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
    }

    /// Currently registered connections.
    #[must_use]
    pub fn connections_active(&self) -> usize {
        self.connections_active.load(Ordering::Relaxed)
    }

    /// Connections registered since start.
    #[must_use]
    pub fn connections_total(&self) -> u64 {
        self.connections_total.load(Ordering::Relaxed)
    }

    /// Publish commands processed.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    /// Envelopes handed to connection channels.
    #[must_use]
    pub fn events_delivered(&self) -> u64 {
        self.events_delivered.load(Ordering::Relaxed)
    }

    /// Envelopes dropped due to slow or closed connections.
    #[must_use]
    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_accounting() {
        let metrics = RelayMetrics::new();
        metrics.record_publish(3, 1);
        metrics.record_publish(0, 0);

        assert_eq!(metrics.events_published(), 2);
        assert_eq!(metrics.events_delivered(), 3);
        assert_eq!(metrics.events_dropped(), 1);
    }

    #[test]
    fn test_connection_counts_do_not_underflow() {
        let metrics = RelayMetrics::new();
        metrics.connection_opened();
        metrics.connection_closed();
        metrics.connection_closed();

        assert_eq!(metrics.connections_active(), 0);
        assert_eq!(metrics.connections_total(), 1);
    }
}
