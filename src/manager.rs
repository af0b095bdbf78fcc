use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::Pool;

/// A trait which provides connection-specific functionality.
///
/// Implementors provide the database-specific logic to create connections;
/// everything about checkout, return, growth, and reconnection is handled by
/// the pool itself.
#[async_trait]
pub trait ManageConnection: Send + Sync + 'static {
    /// The connection type this manager deals with.
    type Connection: PoolableConnection<Error = Self::Error>;
    /// The error type returned by `connect` and by the connection itself.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Attempts to create a new connection.
    ///
    /// Called only from worker tasks, never from a client thread.
    async fn connect(&self) -> Result<Self::Connection, Self::Error>;
}

/// The transactional state of a connection, as reported after it is
/// returned to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// No transaction in progress; the connection can be reused as-is.
    Idle,
    /// A transaction is open and was neither committed nor rolled back.
    InTransaction,
    /// A transaction is open and in an error state.
    InError,
    /// A query is still in flight — the connection was returned while busy.
    Active,
    /// The connection is dead; its status can no longer be determined.
    Unknown,
}

/// The connection contract consumed by the pool core.
///
/// Implementors are the connections a [`ManageConnection`] produces. All
/// methods are called from worker tasks with the connection already removed
/// from the pool's bookkeeping, so no internal synchronization is required.
#[async_trait]
pub trait PoolableConnection: Send + 'static {
    /// The error type surfaced by `rollback` and `commit`.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reports the connection's current transaction state.
    ///
    /// Must be cheap and must not perform I/O; it reflects state already
    /// known to the connection, not a round trip to the database.
    fn transaction_status(&self) -> TransactionStatus;

    /// Rolls back an open transaction.
    ///
    /// Called by the pool when a connection is returned while
    /// [`TransactionStatus::InTransaction`] or [`TransactionStatus::InError`].
    async fn rollback(&mut self) -> Result<(), Self::Error>;

    /// Commits an open transaction.
    ///
    /// Only used by [`Pool::with_connection`]'s commit-on-success
    /// convenience; the pool's own reset logic in `deposit` never calls
    /// this.
    async fn commit(&mut self) -> Result<(), Self::Error>;

    /// Closes the connection. Infallible and idempotent.
    async fn close(self);
}

/// A hook invoked once after each successful `connect`, before the
/// connection is deposited into the pool.
///
/// Modeled on `bb8::ErrorSink`: a `dyn`-safe, cloneable trait object rather
/// than a bare closure, so it can be shared across worker tasks without
/// requiring the manager itself to be `Clone`.
#[async_trait]
pub trait ConfigureHook<M: ManageConnection>: Send + Sync + 'static {
    /// Configure a freshly connected connection. A failure here is treated
    /// identically to a `connect` failure: the attempt is retried per the
    /// reconnection policy.
    async fn configure(&self, conn: &mut M::Connection) -> Result<(), M::Error>;
}

#[async_trait]
impl<M, F, Fut> ConfigureHook<M> for F
where
    M: ManageConnection,
    F: Fn(&mut M::Connection) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), M::Error>> + Send,
{
    async fn configure(&self, conn: &mut M::Connection) -> Result<(), M::Error> {
        (self)(conn).await
    }
}

/// A no-op [`ConfigureHook`].
#[derive(Debug, Clone, Copy)]
pub struct NopConfigureHook;

#[async_trait]
impl<M: ManageConnection> ConfigureHook<M> for NopConfigureHook {
    async fn configure(&self, _conn: &mut M::Connection) -> Result<(), M::Error> {
        Ok(())
    }
}

/// A hook invoked once per [`crate::tasks::Task::Grow`] task that exhausts
/// its `reconnect_timeout` without establishing a connection.
pub trait ReconnectFailedHook<M: ManageConnection>: Send + Sync + 'static {
    /// Called on a worker task after the pool has already decremented its
    /// connection count for the abandoned slot.
    fn reconnect_failed(&self, pool: &Pool<M>);
}

impl<M, F> ReconnectFailedHook<M> for F
where
    M: ManageConnection,
    F: Fn(&Pool<M>) + Send + Sync + 'static,
{
    fn reconnect_failed(&self, pool: &Pool<M>) {
        (self)(pool)
    }
}

/// A no-op [`ReconnectFailedHook`].
#[derive(Debug, Clone, Copy)]
pub struct NopReconnectFailedHook;

impl<M: ManageConnection> ReconnectFailedHook<M> for NopReconnectFailedHook {
    fn reconnect_failed(&self, _pool: &Pool<M>) {}
}

pub(crate) type ConfigureHookRef<M> = Arc<dyn ConfigureHook<M>>;
pub(crate) type ReconnectFailedHookRef<M> = Arc<dyn ReconnectFailedHook<M>>;

impl<M: ManageConnection> fmt::Debug for dyn ConfigureHook<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConfigureHook { .. }")
    }
}

impl<M: ManageConnection> fmt::Debug for dyn ReconnectFailedHook<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReconnectFailedHook { .. }")
    }
}
