use std::time::Duration;

use crate::{CrawlError, ExclusionPolicy, WorkItem};

pub const DEFAULT_PARALLEL_REQUESTS: usize = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub seeds: Vec<WorkItem>,
    pub parallel_requests: usize,
    /// Fetch the images, stylesheets and other resources pages refer to.
    pub page_requisites: bool,
    pub exclusion: ExclusionPolicy,
    pub queue_capacity: usize,
    /// Log a metrics line at this interval while the run is in progress.
    pub progress_interval: Option<Duration>,
}

impl CrawlConfig {
    pub fn new(seeds: Vec<WorkItem>) -> Self {
        Self {
            seeds,
            parallel_requests: DEFAULT_PARALLEL_REQUESTS,
            page_requisites: false,
            exclusion: ExclusionPolicy::none(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress_interval: None,
        }
    }

    /// Parses raw seed locators; the first invalid one aborts the setup.
    pub fn from_urls<I, S>(urls: I) -> Result<Self, CrawlError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let seeds = urls
            .into_iter()
            .map(|raw| {
                let raw = raw.as_ref();
                WorkItem::parse(raw).map_err(|source| CrawlError::InvalidSeed {
                    url: raw.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(seeds))
    }

    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.seeds.is_empty() {
            return Err(CrawlError::NoSeeds);
        }
        if self.parallel_requests == 0 {
            return Err(CrawlError::ZeroParallelism);
        }
        if self.queue_capacity == 0 {
            return Err(CrawlError::ZeroQueueCapacity);
        }
        Ok(())
    }
}
