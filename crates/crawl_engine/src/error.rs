use std::time::Duration;

use thiserror::Error;

use crate::{InvalidItem, MetricsSnapshot};

/// Failures that end a crawl run as a whole.
///
/// Everything that goes wrong with a single item is absorbed into the metrics
/// and the log instead.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("missing URL")]
    NoSeeds,
    #[error("parallel requests must be at least 1")]
    ZeroParallelism,
    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,
    #[error("invalid url {url}: {source}")]
    InvalidSeed {
        url: String,
        #[source]
        source: InvalidItem,
    },
    #[error("failed to compile url blacklist regexp {pattern}: {message}")]
    InvalidExclusionPattern { pattern: String, message: String },
    #[error("failed to open url blacklist {path}: {message}")]
    ExclusionFile { path: String, message: String },
    #[error("crawl cancelled after {} requests", metrics.requests)]
    Cancelled {
        metrics: MetricsSnapshot,
        /// Distinct items accepted before the run was stopped.
        items_seen: usize,
        elapsed: Duration,
    },
}
