use tokio::sync::watch;

/// A piece of state guarded together with a broadcast wake-up.
///
/// Every change wakes every waiter, and each waiter re-checks its own
/// predicate, so a wake-up never has to be "for" a particular waiter.
pub struct CondState<T> {
    tx: watch::Sender<T>,
}

impl<T> CondState<T>
where
    T: Clone + Send + Sync,
{
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn set_state(&self, state: T) {
        self.tx.send_replace(state);
    }

    /// Replaces the state with `update(&state)` in one critical section.
    pub fn update_state<F>(&self, update: F)
    where
        F: FnOnce(&T) -> T,
    {
        self.tx.send_modify(|state| *state = update(state));
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Waits until `condition` holds for the current state.
    pub async fn wait<F>(&self, mut condition: F)
    where
        F: FnMut(&T) -> bool,
    {
        let mut rx = self.tx.subscribe();
        // Only fails once the sender is gone, and `self` owns it.
        let _ = rx.wait_for(|state| condition(state)).await;
    }
}

/// Count of items accepted into a run but not yet fully processed.
pub struct PendingTracker {
    state: CondState<usize>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self {
            state: CondState::new(0),
        }
    }

    pub fn increment(&self) {
        self.state.update_state(|pending| pending + 1);
    }

    pub fn decrement(&self) {
        self.state.update_state(|pending| {
            debug_assert!(*pending > 0, "pending work decremented below zero");
            pending.saturating_sub(1)
        });
    }

    pub fn pending(&self) -> usize {
        self.state.get()
    }

    /// Waits until no accepted item remains queued or in flight.
    pub async fn wait_idle(&self) {
        self.state.wait(|pending| *pending == 0).await;
    }
}

impl Default for PendingTracker {
    fn default() -> Self {
        Self::new()
    }
}
