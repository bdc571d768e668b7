//! Running hub counters. Monitoring only, never correctness-critical.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters maintained by the hub loop and session tasks.
#[derive(Default)]
pub struct HubStats {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    errors: AtomicU64,
    last_activity_unix_ms: AtomicI64,
}

/// Point-in-time copy of the counters.
#[derive(Clone, Debug, Serialize)]
pub struct StatsSnapshot {
    /// Connections accepted since start.
    pub total_connections: u64,
    /// Currently registered connections.
    pub active_connections: u64,
    /// Inbound frames processed by the hub.
    pub messages_received: u64,
    /// Frames enqueued for delivery.
    pub messages_sent: u64,
    /// Routing, persistence, and capacity errors.
    pub errors: u64,
    /// Unix millis of the last hub activity, 0 if none yet.
    pub last_activity_unix_ms: i64,
}

impl HubStats {
    fn touch(&self) {
        self.last_activity_unix_ms
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// A connection registered.
    pub fn connection_opened(&self) {
        let _ = self.total_connections.fetch_add(1, Ordering::Relaxed);
        let _ = self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    /// A connection unregistered.
    pub fn connection_closed(&self) {
        // Saturating: a replaced client and its session can both report.
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
        self.touch();
    }

    /// An inbound frame reached the hub.
    pub fn message_received(&self) {
        let _ = self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    /// A frame was enqueued to some client.
    pub fn message_sent(&self) {
        let _ = self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    /// Something went wrong that was counted rather than propagated.
    pub fn error(&self) {
        let _ = self.errors.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    /// Copy the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_activity_unix_ms: self.last_activity_unix_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = HubStats::default();
        let snap = stats.snapshot();
        assert_eq!(snap.total_connections, 0);
        assert_eq!(snap.active_connections, 0);
        assert_eq!(snap.messages_received, 0);
        assert_eq!(snap.last_activity_unix_ms, 0);
    }

    #[test]
    fn open_close_cycle() {
        let stats = HubStats::default();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();
        let snap = stats.snapshot();
        assert_eq!(snap.total_connections, 2);
        assert_eq!(snap.active_connections, 1);
        assert!(snap.last_activity_unix_ms > 0);
    }

    #[test]
    fn close_never_underflows() {
        let stats = HubStats::default();
        stats.connection_closed();
        stats.connection_closed();
        assert_eq!(stats.snapshot().active_connections, 0);
    }

    #[test]
    fn message_and_error_counts() {
        let stats = HubStats::default();
        stats.message_received();
        stats.message_sent();
        stats.message_sent();
        stats.error();
        let snap = stats.snapshot();
        assert_eq!(snap.messages_received, 1);
        assert_eq!(snap.messages_sent, 2);
        assert_eq!(snap.errors, 1);
    }

    #[test]
    fn snapshot_serializes() {
        let stats = HubStats::default();
        stats.connection_opened();
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["total_connections"], 1);
        assert!(json["last_activity_unix_ms"].is_number());
    }
}
