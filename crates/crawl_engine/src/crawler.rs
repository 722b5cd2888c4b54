//! Crawl orchestration: seeding, the worker pool and completion detection.
//!
//! Termination never looks at the queue. A run is done when the pending
//! count drops to zero, and a worker always increments for every child it
//! accepts before it decrements for the item it was processing. So pending
//! can only reach zero when nothing is queued, nothing is in flight, and
//! nothing is about to be discovered.
//!
//! Workers never wait for queue space themselves: accepted children go to a
//! backlog that a feeder task moves into the bounded queue. A worker is
//! usually the queue's only consumer, and one that blocked on a full queue
//! would never drain it again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crawl_logging::{crawl_debug, crawl_info, crawl_warn};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{
    resolve_reference, BodyStream, ChildExtractor, ContentCategory, CrawlConfig, CrawlError,
    CrawlEvent, CrawlMetrics, CrawlPhase, DedupQueue, EventSink, ExclusionPolicy, ExtractError,
    FailureKind, FetchError, Fetcher, MetricsSnapshot, NoopEventSink, PendingTracker, WorkItem,
};

/// Result of a run that drained completely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSummary {
    pub metrics: MetricsSnapshot,
    /// Distinct items accepted into the run, seeds included.
    pub items_seen: usize,
    pub elapsed: Duration,
}

pub struct Crawler {
    config: CrawlConfig,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ChildExtractor>,
    sink: Arc<dyn EventSink>,
}

impl Crawler {
    pub fn new(
        config: CrawlConfig,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn ChildExtractor>,
    ) -> Self {
        Self {
            config,
            fetcher,
            extractor,
            sink: Arc::new(NoopEventSink),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Crawls until no accepted item is left unprocessed.
    pub async fn run(&self) -> Result<CrawlSummary, CrawlError> {
        self.run_with_cancellation(CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but gives up when `cancel` fires. Items in
    /// flight at that moment are abandoned.
    pub async fn run_with_cancellation(
        &self,
        cancel: CancellationToken,
    ) -> Result<CrawlSummary, CrawlError> {
        self.config.validate()?;
        let started = Instant::now();

        // Seeding runs before any worker exists, so every seed must fit.
        let capacity = self.config.queue_capacity.max(self.config.seeds.len());
        let (backlog, backlog_rx) = mpsc::unbounded_channel();
        let run = Arc::new(CrawlRun {
            queue: DedupQueue::new(capacity),
            backlog,
            pending: PendingTracker::new(),
            metrics: Arc::new(CrawlMetrics::new()),
            exclusion: self.config.exclusion.clone(),
            page_requisites: self.config.page_requisites,
            fetcher: self.fetcher.clone(),
            extractor: self.extractor.clone(),
            sink: self.sink.clone(),
        });

        run.enter(CrawlPhase::Seeding);
        let accepted = run.seed(&self.config.seeds).await;
        crawl_debug!(
            "accepted {} of {} seeds, {} workers",
            accepted,
            self.config.seeds.len(),
            self.config.parallel_requests
        );

        run.enter(CrawlPhase::Running);
        let stop = cancel.child_token();
        let mut tasks = JoinSet::new();
        tasks.spawn(run.clone().feed(backlog_rx));
        for worker_id in 0..self.config.parallel_requests {
            tasks.spawn(run.clone().work(worker_id, stop.clone()));
        }
        if let Some(every) = self.config.progress_interval {
            tasks.spawn(run.clone().report_progress(every));
        }

        run.enter(CrawlPhase::Draining);
        let cancelled = tokio::select! {
            biased;
            _ = run.pending.wait_idle() => false,
            _ = cancel.cancelled() => true,
        };

        // Idle workers are parked in `next()` and will never be handed
        // another item.
        stop.cancel();
        tasks.shutdown().await;

        let metrics = run.metrics.snapshot();
        if cancelled {
            crawl_warn!(
                "crawl cancelled with {} items pending ({} requests, {} errors)",
                run.pending.pending(),
                metrics.requests,
                metrics.errors
            );
            return Err(CrawlError::Cancelled {
                metrics,
                items_seen: run.queue.seen_len(),
                elapsed: started.elapsed(),
            });
        }

        run.enter(CrawlPhase::Done);
        Ok(CrawlSummary {
            metrics,
            items_seen: run.queue.seen_len(),
            elapsed: started.elapsed(),
        })
    }
}

/// State shared by the workers of one run.
struct CrawlRun {
    queue: DedupQueue<WorkItem>,
    /// Accepted children not yet moved into `queue`.
    backlog: mpsc::UnboundedSender<WorkItem>,
    pending: PendingTracker,
    metrics: Arc<CrawlMetrics>,
    exclusion: ExclusionPolicy,
    page_requisites: bool,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ChildExtractor>,
    sink: Arc<dyn EventSink>,
}

impl CrawlRun {
    fn enter(&self, phase: CrawlPhase) {
        crawl_debug!("crawl phase {:?}", phase);
        self.sink.emit(CrawlEvent::PhaseChanged(phase));
    }

    async fn seed(&self, seeds: &[WorkItem]) -> usize {
        let mut accepted = 0;
        for seed in seeds {
            if self.exclusion.is_excluded(seed) {
                crawl_info!("skipping excluded url {}", seed);
                continue;
            }
            if self.admit(seed.clone()).await {
                accepted += 1;
            }
        }
        accepted
    }

    /// Accepts `item` into the run unless it was seen before. The pending
    /// count is raised before the item can reach a worker.
    async fn admit(&self, item: WorkItem) -> bool {
        self.queue
            .add_then(item, || self.pending.increment())
            .await
    }

    /// Like [`admit`](Self::admit), but hands the item to the feeder instead
    /// of waiting for queue space.
    fn admit_child(&self, item: WorkItem) -> bool {
        if !self.queue.accept_then(&item, || self.pending.increment()) {
            return false;
        }
        if self.backlog.send(item).is_err() {
            // Only happens once the run is being torn down.
            crawl_debug!("feeder gone, dropping accepted item");
        }
        true
    }

    async fn feed(self: Arc<Self>, mut backlog: mpsc::UnboundedReceiver<WorkItem>) {
        while let Some(item) = backlog.recv().await {
            self.queue.push(item).await;
        }
    }

    async fn work(self: Arc<Self>, worker_id: usize, stop: CancellationToken) {
        loop {
            let item = tokio::select! {
                _ = stop.cancelled() => break,
                item = self.queue.next() => item,
            };
            self.process(&item).await;
            self.pending.decrement();
        }
        crawl_debug!("worker {} stopped", worker_id);
    }

    async fn process(&self, item: &WorkItem) {
        crawl_debug!("GET {}", item);
        let started = Instant::now();
        self.metrics.record_request();

        let response = match self.fetcher.fetch(item, self.metrics.as_ref()).await {
            Ok(response) => response,
            Err(error) => return self.fail(item, error),
        };
        if response.is_error_status() {
            let error = FetchError::new(
                FailureKind::HttpStatus(response.status),
                format!("{} {}", response.protocol, response.status),
            );
            return self.fail(item, error);
        }

        let category = response.category();
        let expand = self.page_requisites && category.is_expandable();
        let mut body = Vec::new();
        let received = self
            .receive(response.body, expand.then_some(&mut body))
            .await;
        let bytes = match received {
            Ok(bytes) => bytes,
            Err(error) => return self.fail(item, error),
        };

        let children_accepted = if expand {
            self.expand(item, body, category, response.content_type.clone())
                .await
        } else {
            0
        };

        let elapsed = started.elapsed();
        crawl_info!(
            "got {} {} {}, {} byte, {:.6} s",
            item,
            response.protocol,
            response.status,
            bytes,
            elapsed.as_secs_f64()
        );
        self.sink.emit(CrawlEvent::ItemFetched {
            item: item.clone(),
            status: response.status,
            bytes,
            children_accepted,
            elapsed,
        });
    }

    /// Reads the body to the end, counting bytes as they arrive. With a
    /// buffer the body is kept, otherwise it is discarded chunk by chunk.
    async fn receive(
        &self,
        mut body: BodyStream,
        mut buffer: Option<&mut Vec<u8>>,
    ) -> Result<u64, FetchError> {
        let mut received = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            received += chunk.len() as u64;
            self.metrics.add_bytes(chunk.len() as u64);
            if let Some(buffer) = buffer.as_deref_mut() {
                buffer.extend_from_slice(&chunk);
            }
        }
        Ok(received)
    }

    /// Admits the requisites referenced by `body`; returns how many were new.
    async fn expand(
        &self,
        item: &WorkItem,
        body: Vec<u8>,
        category: ContentCategory,
        content_type: Option<String>,
    ) -> usize {
        let extractor = self.extractor.clone();
        let references = tokio::task::spawn_blocking(move || {
            extractor.extract_children(&body, category, content_type.as_deref())
        })
        .await
        .unwrap_or_else(|err| Err(ExtractError::Aborted(err.to_string())));

        let references = match references {
            Ok(references) => references,
            Err(err) => {
                crawl_warn!("failed to extract requisites of {}: {}", item, err);
                return 0;
            }
        };

        let mut accepted = 0;
        for reference in references {
            let Some(child) = resolve_reference(item, &reference) else {
                continue;
            };
            if self.exclusion.is_excluded(&child) {
                crawl_debug!("skipping excluded url {}", child);
                continue;
            }
            if self.admit_child(child) {
                accepted += 1;
            }
        }
        accepted
    }

    fn fail(&self, item: &WorkItem, error: FetchError) {
        self.metrics.record_error();
        crawl_warn!("failed {}: {}", item, error);
        self.sink.emit(CrawlEvent::ItemFailed {
            item: item.clone(),
            error,
        });
    }

    async fn report_progress(self: Arc<Self>, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let metrics = self.metrics.snapshot();
            crawl_info!(
                "progress: {} requests, {} errors, {} byte, {} pending",
                metrics.requests,
                metrics.errors,
                metrics.bytes_received,
                self.pending.pending()
            );
        }
    }
}
