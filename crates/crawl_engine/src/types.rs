use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::WorkItem;

/// Body of a fetched resource, delivered chunk by chunk.
pub type BodyStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// What kind of content a response carries, as far as expansion cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    Hypertext,
    Stylesheet,
    Other,
}

impl ContentCategory {
    /// Classifies a `Content-Type` header value. Parameters such as
    /// `charset` are ignored and the media type is compared case-insensitively.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return ContentCategory::Other;
        };
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim()
            .to_ascii_lowercase();
        match media_type.as_str() {
            "text/html" | "application/xhtml+xml" => ContentCategory::Hypertext,
            "text/css" => ContentCategory::Stylesheet,
            _ => ContentCategory::Other,
        }
    }

    pub fn is_expandable(self) -> bool {
        matches!(self, ContentCategory::Hypertext | ContentCategory::Stylesheet)
    }
}

/// A response whose headers have arrived; the body is still on the wire.
pub struct FetchResponse {
    pub status: u16,
    pub protocol: String,
    pub content_type: Option<String>,
    pub body: BodyStream,
}

impl FetchResponse {
    pub fn category(&self) -> ContentCategory {
        ContentCategory::from_content_type(self.content_type.as_deref())
    }

    pub fn is_error_status(&self) -> bool {
        !(200..300).contains(&self.status)
    }
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("protocol", &self.protocol)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    Network,
    /// The connection broke while the body was streaming.
    Body,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Body => write!(f, "body transfer error"),
        }
    }
}

/// Lifecycle of one crawl run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Seeding,
    Running,
    Draining,
    Done,
}

/// Per-item outcome reported to an [`EventSink`](crate::EventSink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    PhaseChanged(CrawlPhase),
    ItemFetched {
        item: WorkItem,
        status: u16,
        bytes: u64,
        children_accepted: usize,
        elapsed: Duration,
    },
    ItemFailed {
        item: WorkItem,
        error: FetchError,
    },
}
