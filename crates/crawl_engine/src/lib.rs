//! Crawl engine: deduplicating work queue, pending-work tracking and the
//! worker pool that fetches items and expands them into their page requisites.
mod config;
mod crawler;
mod decode;
mod error;
mod exclusion;
mod fetch;
mod item;
mod metrics;
mod pending;
mod queue;
mod requisites;
mod sink;
mod types;

pub use config::{CrawlConfig, DEFAULT_PARALLEL_REQUESTS, DEFAULT_QUEUE_CAPACITY};
pub use crawler::{CrawlSummary, Crawler};
pub use decode::{decode_body, DecodeError, DecodedText};
pub use error::CrawlError;
pub use exclusion::ExclusionPolicy;
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use item::{resolve_reference, InvalidItem, WorkItem};
pub use metrics::{ConnectionObserver, CrawlMetrics, MetricsSnapshot};
pub use pending::{CondState, PendingTracker};
pub use queue::DedupQueue;
pub use requisites::{ChildExtractor, ExtractError, RequisiteExtractor};
pub use sink::{ChannelEventSink, EventSink, NoopEventSink};
pub use types::{
    BodyStream, ContentCategory, CrawlEvent, CrawlPhase, FailureKind, FetchError, FetchResponse,
};
