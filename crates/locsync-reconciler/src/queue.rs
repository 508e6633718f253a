//! Deduplicating, rate-limited work queue
//!
//! Items are deduplicated while pending, and an item is never handed to two
//! workers at once: adding an item that is being processed marks it dirty,
//! and it is queued again once the worker calls [`WorkQueue::done`].
//! Failed items are re-added after a per-item exponential backoff.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

struct QueueState<T> {
    items: VecDeque<T>,
    /// Items waiting to be processed, queued or not
    dirty: HashSet<T>,
    processing: HashSet<T>,
    failures: HashMap<T, u32>,
    /// Rate-limited adds whose timer has not fired yet
    delayed: usize,
    shutting_down: bool,
}

/// Work queue feeding a pool of workers
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> WorkQueue<T>
where
    T: Clone + Eq + Hash + Send + 'static,
{
    /// Create a queue whose retry delay starts at `base_delay` and doubles per
    /// failure up to `max_delay`
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                failures: HashMap::new(),
                delayed: 0,
                shutting_down: false,
            }),
            notify: Notify::new(),
            base_delay,
            max_delay,
        }
    }

    /// Queue an item unless it is already pending
    pub fn add(&self, item: T) {
        let queued = Self::push(&mut self.state.lock(), item);
        if queued {
            self.notify.notify_one();
        }
    }

    fn push(state: &mut QueueState<T>, item: T) -> bool {
        if state.shutting_down || !state.dirty.insert(item.clone()) {
            return false;
        }
        if state.processing.contains(&item) {
            return false;
        }
        state.items.push_back(item);
        true
    }

    /// Wait for the next item; `None` once the queue is shut down and drained
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if let Some(item) = state.items.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Finish processing an item, requeueing it if it was added meanwhile
    pub fn done(&self, item: &T) {
        let requeued = {
            let mut state = self.state.lock();
            state.processing.remove(item);
            if state.dirty.contains(item) {
                state.items.push_back(item.clone());
                true
            } else {
                false
            }
        };
        if requeued {
            self.notify.notify_one();
        }
    }

    /// Add an item after its backoff delay
    pub fn add_rate_limited(self: &Arc<Self>, item: T) {
        let delay = {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            let failures = state.failures.entry(item.clone()).or_insert(0);
            let delay = self.backoff(*failures);
            *failures = failures.saturating_add(1);
            state.delayed += 1;
            delay
        };

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let queued = {
                let mut state = queue.state.lock();
                state.delayed -= 1;
                Self::push(&mut state, item)
            };
            if queued {
                queue.notify.notify_one();
            }
        });
    }

    /// Stop tracking failures of an item
    pub fn forget(&self, item: &T) {
        self.state.lock().failures.remove(item);
    }

    /// Number of rate-limited adds since the last `forget`
    #[must_use]
    pub fn num_requeues(&self, item: &T) -> u32 {
        self.state.lock().failures.get(item).copied().unwrap_or(0)
    }

    /// Refuse new items and wake idle workers
    pub fn shut_down(&self) {
        self.state.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    /// Number of queued items
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// No queued, in-flight or delayed items
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.items.is_empty() && state.processing.is_empty() && state.delayed == 0
    }

    fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}
