use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

/// Bounded FIFO that accepts each distinct item only the first time it is offered.
///
/// `seen` only grows, so an item that was already delivered and processed is
/// still rejected later on. Adding blocks while the buffer is full.
///
/// Acceptance and buffering can also be done in two steps with
/// [`accept_then`](Self::accept_then) and [`push`](Self::push), so that the
/// blocking part can run on a different task than the dedup decision.
pub struct DedupQueue<T> {
    seen: Mutex<HashSet<T>>,
    tx: mpsc::Sender<T>,
    rx: tokio::sync::Mutex<mpsc::Receiver<T>>,
}

impl<T> DedupQueue<T>
where
    T: Eq + Hash + Clone + Send,
{
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            seen: Mutex::new(HashSet::new()),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Returns `true` iff this call accepted `item` for the first time.
    pub async fn add(&self, item: T) -> bool {
        self.add_then(item, || {}).await
    }

    /// Like [`add`](Self::add), but runs `on_accept` after `item` is accepted
    /// and before it can be handed out by [`next`](Self::next).
    pub async fn add_then<F>(&self, item: T, on_accept: F) -> bool
    where
        F: FnOnce(),
    {
        if !self.accept_then(&item, on_accept) {
            return false;
        }
        self.push(item).await;
        true
    }

    /// Records `item` as seen without buffering it. Returns `true` and runs
    /// `on_accept` iff this is the first time `item` is offered; the caller
    /// then owes exactly one [`push`](Self::push) of it.
    pub fn accept_then<F>(&self, item: &T, on_accept: F) -> bool
    where
        F: FnOnce(),
    {
        {
            let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
            if !seen.insert(item.clone()) {
                return false;
            }
        }
        on_accept();
        true
    }

    /// Buffers an already accepted item, waiting while the buffer is full.
    pub async fn push(&self, item: T) {
        // `self` owns the receiver, so the channel stays open while we exist.
        let _ = self.tx.send(item).await;
    }

    /// Waits for the oldest buffered item.
    pub async fn next(&self) -> T {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(item) => item,
            None => unreachable!("dedup queue owns its sender"),
        }
    }

    /// Number of distinct items ever accepted.
    pub fn seen_len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of accepted items waiting for a worker.
    pub fn buffered_len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}
