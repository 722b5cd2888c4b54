use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use reqwest::header::CONTENT_TYPE;
use tower::{Layer, Service};

use crate::{ConnectionObserver, FailureKind, FetchError, FetchResponse, WorkItem};

pub const DEFAULT_USER_AGENT: &str = "crawl-perf";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Performs the network side of a crawl.
///
/// Implementations return as soon as the response head is available; the
/// body is consumed by the caller through [`FetchResponse::body`].
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        item: &WorkItem,
        connections: &dyn ConnectionObserver,
    ) -> Result<FetchResponse, FetchError>;
}

/// HTTP fetcher backed by one pooled `reqwest` client.
///
/// Connections are counted where the client's connector opens them. The
/// count is handed to the observer of whichever request drains it first,
/// which for a fetcher used by one run at a time is that run's observer.
#[derive(Debug)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    opened: Arc<AtomicU64>,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let opened = Arc::new(AtomicU64::new(0));
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .user_agent(settings.user_agent)
            .connector_layer(CountConnectionsLayer {
                opened: opened.clone(),
            })
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client, opened })
    }

    fn report_connections(&self, connections: &dyn ConnectionObserver) {
        let opened = self.opened.swap(0, Ordering::Relaxed);
        if opened > 0 {
            connections.connections_established(opened);
        }
    }
}

/// Counts every successful connect made by the wrapped connector.
#[derive(Debug, Clone)]
struct CountConnectionsLayer {
    opened: Arc<AtomicU64>,
}

impl<S> Layer<S> for CountConnectionsLayer {
    type Service = CountConnections<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CountConnections {
            inner,
            opened: self.opened.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct CountConnections<S> {
    inner: S,
    opened: Arc<AtomicU64>,
}

impl<S, R> Service<R> for CountConnections<S>
where
    S: Service<R>,
    S::Future: Send + 'static,
    S::Response: 'static,
    S::Error: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, target: R) -> Self::Future {
        let opened = self.opened.clone();
        self.inner
            .call(target)
            .inspect(move |result| {
                if result.is_ok() {
                    opened.fetch_add(1, Ordering::Relaxed);
                }
            })
            .boxed()
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        item: &WorkItem,
        connections: &dyn ConnectionObserver,
    ) -> Result<FetchResponse, FetchError> {
        let sent = self.client.get(item.url().clone()).send().await;
        // A connect can succeed even when the request itself fails.
        self.report_connections(connections);
        let response = sent.map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let protocol = format!("{:?}", response.version());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk.map_err(|err| {
                    let mut mapped = map_reqwest_error(err);
                    if mapped.kind == FailureKind::Network {
                        mapped.kind = FailureKind::Body;
                    }
                    mapped
                })
            })
            .boxed();

        Ok(FetchResponse {
            status,
            protocol,
            content_type,
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    if err.is_builder() {
        return FetchError::new(FailureKind::InvalidUrl, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
