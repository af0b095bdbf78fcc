//! Maintenance task variants (C5) and the reconnection/backoff policy.
//!
//! Modeled on bb8's `add_connection` free function (the teacher's
//! equivalent of `Grow`), generalized from a single fire-and-retry future
//! into the tagged-variant dispatch `spec.md` §9 calls for, carrying the
//! original `psycopg3` pool's jittered exponential backoff
//! (`original_source/psycopg3/psycopg3/pool.py`, `AddConnection._handle_error`).

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::manager::ManageConnection;
use crate::pool::{Pool, PoolCore};

const INITIAL_DELAY: Duration = Duration::from_secs(1);
const JITTER: f64 = 0.1;
const BACKOFF: f64 = 2.0;

/// The state a `Grow` task carries across reschedules: the delay before the
/// next attempt, and the absolute instant after which it gives up.
///
/// `give_up_at` is `None` until the first failure, at which point it is
/// pinned for the lifetime of this retry chain — it is not recomputed on
/// subsequent failures.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowState {
    delay: Duration,
    give_up_at: Option<Instant>,
}

impl GrowState {
    pub(crate) fn fresh() -> Self {
        GrowState {
            delay: Duration::ZERO,
            give_up_at: None,
        }
    }
}

/// A tagged maintenance task, executed entirely off the client's thread by
/// a worker task from [`crate::queue`].
///
/// `InitialFill` and `Grow` share one execution path (`run_grow`): the only
/// difference in the source's behavior was which event they eventually
/// signal, and here that signal — the construction-time completion latch —
/// lives in `PoolCore` and is consulted by `deposit` after *every*
/// successful fill, initial or retried. See `spec.md` §4.5 and DESIGN.md.
pub(crate) enum Task<M: ManageConnection> {
    InitialFill,
    Grow(GrowState),
    Return(M::Connection),
    StopWorker,
}

impl<M: ManageConnection> Task<M> {
    /// Runs this task's effect. Never propagates failure to the poster —
    /// failures are logged and, for `Grow`, drive the retry policy.
    pub(crate) async fn execute(self, core: &Arc<PoolCore<M>>) {
        match self {
            Task::InitialFill => run_grow(core, GrowState::fresh()).await,
            Task::Grow(state) => run_grow(core, state).await,
            Task::Return(conn) => core.deposit(conn).await,
            Task::StopWorker => {}
        }
    }
}

/// Always attempts a connect first, even on the retry scheduled for exactly
/// `give_up_at` — the give-up check runs only after that attempt has
/// failed. Checking it beforehand would mean the final scheduled retry,
/// which the scheduler never fires before `due == give_up_at`, finds
/// `now >= give_up_at` already true and never actually calls `connect`,
/// silently skipping the last attempt. Mirrors
/// `original_source/psycopg3/psycopg3/pool.py`'s `AddConnection._run`
/// (always connects) and `_handle_error` (give-up check only on failure).
async fn run_grow<M: ManageConnection>(core: &Arc<PoolCore<M>>, mut state: GrowState) {
    match core.connect_and_configure().await {
        Ok(conn) => core.deposit(conn).await,
        Err(e) => {
            let now = Instant::now();
            if let Some(give_up_at) = state.give_up_at {
                if now >= give_up_at {
                    tracing::warn!(
                        pool = %core.name(),
                        reconnect_timeout = ?core.options().reconnect_timeout,
                        error = %e,
                        "reconnection attempt failed after exhausting the give-up deadline"
                    );
                    core.grow_give_up();
                    core.options()
                        .reconnect_failed
                        .reconnect_failed(&Pool::from_core(core.clone()));
                    return;
                }
            }

            tracing::warn!(pool = %core.name(), error = %e, "error establishing connection, scheduling retry");

            let give_up_at = *state
                .give_up_at
                .get_or_insert_with(|| now + core.options().reconnect_timeout);

            state.delay = if state.delay.is_zero() {
                jittered_initial_delay()
            } else {
                state.delay.mul_f64(BACKOFF)
            };

            let due = if now + state.delay < give_up_at {
                now + state.delay
            } else {
                give_up_at
            };

            let core = core.clone();
            core.scheduler().schedule_at(
                due,
                Box::new(move || {
                    core.post_task(Task::Grow(state));
                }),
            );
        }
    }
}

fn jittered_initial_delay() -> Duration {
    let jitter = rand::thread_rng().gen_range(-JITTER..=JITTER);
    INITIAL_DELAY.mul_f64(1.0 + jitter)
}
