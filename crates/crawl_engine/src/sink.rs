use std::sync::mpsc;

use crate::CrawlEvent;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: CrawlEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: CrawlEvent) {}
}

/// Forwards events to a channel; a dropped receiver is ignored.
pub struct ChannelEventSink {
    tx: mpsc::Sender<CrawlEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<CrawlEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: CrawlEvent) {
        let _ = self.tx.send(event);
    }
}
