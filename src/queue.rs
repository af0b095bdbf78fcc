//! The maintenance task queue and its worker pool (C2).
//!
//! An unbounded FIFO serviced by `num_workers` identical tasks, grounded on
//! `sqlx-core`'s use of `flume` to hand work to a background worker off the
//! caller's path (`sqlx-core/Cargo.toml`: "used by the SQLite worker thread
//! to block on the async mutex that locks the database handle"). Here the
//! channel is genuinely multi-consumer, one clone of the `Receiver` per
//! worker task, matching `spec.md` §4.2's "`numWorkers` identical worker
//! threads" pulling from one shared queue.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::manager::ManageConnection;
use crate::pool::PoolCore;
use crate::tasks::Task;

/// Workers dequeue with a ~60s timeout, jittered ±10% per worker so they
/// don't all wake at once. The timeout only exists to keep the wait
/// interruptible; no correctness property depends on it firing (spec.md
/// §4.2).
const WORKER_RECV_TIMEOUT: Duration = Duration::from_secs(60);

/// Spawns `num_workers` worker tasks pulling from `rx`.
///
/// The channel is created by the caller (`PoolCore::construct`) because the
/// `Sender` half is itself a field of `PoolCore` — workers need a fully
/// constructed `Arc<PoolCore<M>>` to execute tasks against, so the channel
/// has to exist before that `Arc` does.
pub(crate) fn spawn_workers<M: ManageConnection>(
    core: &Arc<PoolCore<M>>,
    rx: flume::Receiver<Task<M>>,
    num_workers: usize,
) {
    for idx in 0..num_workers {
        let core = core.clone();
        let rx = rx.clone();
        tokio::spawn(async move { worker_loop(idx, core, rx).await });
    }
}

async fn worker_loop<M: ManageConnection>(
    idx: usize,
    core: Arc<PoolCore<M>>,
    rx: flume::Receiver<Task<M>>,
) {
    let jitter = rand::thread_rng().gen_range(-0.1..=0.1);
    let recv_timeout = WORKER_RECV_TIMEOUT.mul_f64(1.0 + jitter);

    loop {
        match tokio::time::timeout(recv_timeout, rx.recv_async()).await {
            Ok(Ok(task)) => {
                let is_stop = matches!(task, Task::StopWorker);
                task.execute(&core).await;
                if is_stop {
                    tracing::debug!(worker = idx, "worker exiting");
                    return;
                }
            }
            // All senders dropped: the pool (and its queue) is gone.
            Ok(Err(_disconnected)) => return,
            // Wait timed out; loop back around and block again.
            Err(_elapsed) => continue,
        }
    }
}
