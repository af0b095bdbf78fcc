//! A single-threaded, monotonic-time delay queue.
//!
//! Grounded on `bb8`'s reaper (`schedule_one_reaping` in the teacher's
//! `src/lib.rs`), generalized from a single fixed-rate interval to an
//! arbitrary set of one-shot, possibly-rescheduled callbacks — which is what
//! the reconnection backoff in `crate::tasks` needs.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;

use tokio::sync::Notify;
use tokio::time::Instant;

// `tokio::time::Instant` rather than `std::time::Instant`: under
// `tokio::time::pause`/`advance` (used throughout the test suite), only the
// former tracks the virtual clock. Mixing the two would make eviction and
// backoff deadlines immune to the paused clock and un-testable without real
// sleeps.

type Callback = Box<dyn FnOnce() + Send>;

struct Entry {
    due: Instant,
    seq: u64,
    callback: Callback,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}
impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse so `BinaryHeap` (a max-heap) pops the earliest due time.
        other.due.cmp(&self.due).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Queue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

/// Handle to a running scheduler task.
///
/// The scheduler itself runs on one dedicated `tokio::task`; `scheduleAfter`
/// / `scheduleAt` / `stop` only touch the shared queue and notify the task,
/// they never run user code.
pub(crate) struct Scheduler {
    queue: Mutex<Queue>,
    notify: Notify,
    stopped: AtomicBool,
}

impl Scheduler {
    pub(crate) fn new() -> std::sync::Arc<Self> {
        let scheduler = std::sync::Arc::new(Scheduler {
            queue: Mutex::new(Queue {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            notify: Notify::new(),
            stopped: AtomicBool::new(false),
        });
        let task_handle = scheduler.clone();
        tokio::spawn(async move { task_handle.run().await });
        scheduler
    }

    /// Schedule `callback` to run after `delay` elapses.
    pub(crate) fn schedule_after(&self, delay: std::time::Duration, callback: Callback) {
        self.schedule_at(Instant::now() + delay, callback);
    }

    /// Schedule `callback` to run at the given absolute monotonic instant.
    pub(crate) fn schedule_at(&self, at: Instant, callback: Callback) {
        let mut queue = self.queue.lock().unwrap();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.heap.push(Entry {
            due: at,
            seq,
            callback,
        });
        drop(queue);
        self.notify.notify_one();
    }

    /// Stop the scheduler task. Idempotent; entries still pending are
    /// dropped without running.
    pub(crate) fn stop(&self) {
        self.stopped.store(true, AtomicOrdering::Release);
        self.notify.notify_one();
    }

    async fn run(self: std::sync::Arc<Self>) {
        loop {
            if self.stopped.load(AtomicOrdering::Acquire) {
                tracing::debug!("scheduler stopping");
                return;
            }

            let next_due = {
                let queue = self.queue.lock().unwrap();
                queue.heap.peek().map(|e| e.due)
            };

            match next_due {
                None => self.notify.notified().await,
                Some(due) => {
                    let now = Instant::now();
                    if due <= now {
                        let entry = {
                            let mut queue = self.queue.lock().unwrap();
                            queue.heap.pop()
                        };
                        if let Some(entry) = entry {
                            (entry.callback)();
                        }
                        continue;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep_until(due) => {}
                        _ = self.notify.notified() => {}
                    }
                }
            }
        }
    }
}
