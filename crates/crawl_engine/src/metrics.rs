use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Run-wide counters updated by workers.
///
/// Counters are independent: a reader racing the workers may see bytes for a
/// request it has not counted yet. Once the run is idle every counter is final.
#[derive(Debug, Default)]
pub struct CrawlMetrics {
    bytes_received: AtomicU64,
    requests: AtomicU64,
    errors: AtomicU64,
    connections: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub bytes_received: u64,
    pub requests: u64,
    pub errors: u64,
    pub connections: u64,
}

impl CrawlMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connections(&self, count: u64) {
        self.connections.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
        }
    }
}

/// Hook through which a fetcher reports transport connections it opened
/// while serving one request.
pub trait ConnectionObserver: Send + Sync {
    fn connections_established(&self, count: u64);
}

impl ConnectionObserver for CrawlMetrics {
    fn connections_established(&self, count: u64) {
        self.record_connections(count);
    }
}
