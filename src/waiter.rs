//! The one-shot rendezvous a blocked `acquire` waits on.
//!
//! Built directly on `tokio::sync::oneshot`, the same primitive bb8 uses for
//! its waiter queue (`PoolInternals::waiters: VecDeque<oneshot::Sender<_>>`
//! in the teacher). The pool decides who wakes whom; this module has no
//! ordering logic of its own.

use tokio::sync::oneshot;

use crate::error::PoolError;
use crate::manager::ManageConnection;

/// The sending half held by the pool, pushed onto `waiters` under the lock.
pub(crate) type WaiterTx<M> =
    oneshot::Sender<Result<<M as ManageConnection>::Connection, PoolError<<M as ManageConnection>::Error>>>;

/// The receiving half a blocked `acquire` call awaits.
pub(crate) struct Waiter<M: ManageConnection> {
    rx: oneshot::Receiver<Result<M::Connection, PoolError<M::Error>>>,
}

impl<M: ManageConnection> Waiter<M> {
    pub(crate) fn channel() -> (WaiterTx<M>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Waiter { rx })
    }

    /// Blocks until signalled or `timeout` elapses.
    ///
    /// On timeout the receiver is dropped when this future is dropped by
    /// `tokio::time::timeout`; the sender side (`Pool::deposit`) observes
    /// that as a failed `send` and re-deposits the connection rather than
    /// leaking it.
    pub(crate) async fn wait(
        self,
        timeout: std::time::Duration,
    ) -> Result<M::Connection, PoolError<M::Error>> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(result)) => result,
            // The sender was dropped without sending: only happens if the
            // pool is torn down mid-flight outside of `close` (which always
            // sends `Err(Closed)` before dropping waiters).
            Ok(Err(_recv_error)) => Err(PoolError::Closed),
            Err(_elapsed) => Err(PoolError::Timeout),
        }
    }
}
