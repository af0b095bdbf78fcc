//! Pool construction and configuration.
//!
//! Mirrors bb8's `Builder<M>` (self-consuming setter chain over a
//! `Default` impl) but renamed to the spec's field names and, unlike the
//! teacher, validated at `build()` time rather than via `assert!` — a
//! misconfigured pool is a caller mistake a library should let the caller
//! catch, not a panic. See DESIGN.md.

use std::fmt;
use std::time::Duration;

use crate::error::PoolError;
use crate::manager::{
    ConfigureHook, ConfigureHookRef, ManageConnection, NopConfigureHook, NopReconnectFailedHook,
    ReconnectFailedHook, ReconnectFailedHookRef,
};
use crate::pool::Pool;

pub(crate) struct PoolOptions<M: ManageConnection> {
    pub(crate) name: Option<String>,
    pub(crate) min_conns: u32,
    pub(crate) max_conns: u32,
    pub(crate) acquire_timeout: Duration,
    pub(crate) max_idle: Duration,
    pub(crate) reconnect_timeout: Duration,
    pub(crate) num_workers: usize,
    pub(crate) configure: ConfigureHookRef<M>,
    pub(crate) reconnect_failed: ReconnectFailedHookRef<M>,
}

/// A builder for a [`Pool`].
///
/// Parameters are initialized with the defaults `spec.md` §6 prescribes:
/// `min_conns = 4`, `max_conns = min_conns`, `acquire_timeout = 30s`,
/// `max_idle = 10min`, `reconnect_timeout = 5min`, `num_workers = 3`.
pub struct Builder<M: ManageConnection> {
    name: Option<String>,
    min_conns: u32,
    max_conns: Option<u32>,
    acquire_timeout: Duration,
    max_idle: Duration,
    reconnect_timeout: Duration,
    num_workers: usize,
    configure: ConfigureHookRef<M>,
    reconnect_failed: ReconnectFailedHookRef<M>,
}

impl<M: ManageConnection> fmt::Debug for Builder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("name", &self.name)
            .field("min_conns", &self.min_conns)
            .field("max_conns", &self.max_conns)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("max_idle", &self.max_idle)
            .field("reconnect_timeout", &self.reconnect_timeout)
            .field("num_workers", &self.num_workers)
            .finish()
    }
}

impl<M: ManageConnection> Default for Builder<M> {
    fn default() -> Self {
        Builder {
            name: None,
            min_conns: 4,
            max_conns: None,
            acquire_timeout: Duration::from_secs(30),
            max_idle: Duration::from_secs(10 * 60),
            reconnect_timeout: Duration::from_secs(5 * 60),
            num_workers: 3,
            configure: std::sync::Arc::new(NopConfigureHook),
            reconnect_failed: std::sync::Arc::new(NopReconnectFailedHook),
        }
    }
}

impl<M: ManageConnection> Builder<M> {
    /// Constructs a new `Builder` with the spec's default values.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets a name for the pool, included in its tracing spans and log
    /// lines so multiple pools in the same process can be told apart.
    ///
    /// Defaults to the pool's numeric id.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the minimum number of connections the pool maintains.
    ///
    /// Defaults to 4.
    pub fn min_conns(mut self, min_conns: u32) -> Self {
        self.min_conns = min_conns;
        self
    }

    /// Sets the maximum number of connections the pool may grow to.
    ///
    /// Defaults to `min_conns`.
    pub fn max_conns(mut self, max_conns: u32) -> Self {
        self.max_conns = Some(max_conns);
        self
    }

    /// Sets the default timeout `acquire` waits before failing with
    /// `PoolError::Timeout`.
    ///
    /// Defaults to 30 seconds.
    pub fn acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    /// Sets how long a connection may sit idle, once `n_conns > min_conns`,
    /// before it is evicted on the next deposit.
    ///
    /// Defaults to 10 minutes.
    pub fn max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Sets how long the pool keeps retrying a failed reconnection before
    /// giving up and calling `reconnect_failed`.
    ///
    /// Defaults to 5 minutes.
    pub fn reconnect_timeout(mut self, reconnect_timeout: Duration) -> Self {
        self.reconnect_timeout = reconnect_timeout;
        self
    }

    /// Sets the number of maintenance worker tasks.
    ///
    /// Defaults to 3.
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Sets the hook called once after each successful `connect`, before
    /// the connection is deposited into the pool.
    pub fn configure<H>(mut self, hook: H) -> Self
    where
        H: ConfigureHook<M>,
    {
        self.configure = std::sync::Arc::new(hook);
        self
    }

    /// Sets the hook called when a `Grow` task exhausts its
    /// `reconnect_timeout`.
    pub fn reconnect_failed<H>(mut self, hook: H) -> Self
    where
        H: ReconnectFailedHook<M>,
    {
        self.reconnect_failed = std::sync::Arc::new(hook);
        self
    }

    fn into_options(self) -> Result<PoolOptions<M>, PoolError<M::Error>> {
        let max_conns = self.max_conns.unwrap_or(self.min_conns);
        if max_conns < self.min_conns {
            return Err(PoolError::InvalidArgument(
                "max_conns must be greater than or equal to min_conns",
            ));
        }
        if self.num_workers < 1 {
            return Err(PoolError::InvalidArgument(
                "num_workers must be at least 1",
            ));
        }
        Ok(PoolOptions {
            name: self.name,
            min_conns: self.min_conns,
            max_conns,
            acquire_timeout: self.acquire_timeout,
            max_idle: self.max_idle,
            reconnect_timeout: self.reconnect_timeout,
            num_workers: self.num_workers,
            configure: self.configure,
            reconnect_failed: self.reconnect_failed,
        })
    }

    /// Consumes the builder, constructing and initializing a [`Pool`].
    ///
    /// Blocks until all `min_conns` initial connections are established, or
    /// until `acquire_timeout` elapses — in which case the partially
    /// constructed pool is closed and `PoolError::Timeout` is returned.
    /// Construction either succeeds with every initial connection
    /// established, or leaves no live tasks behind (spec.md §4.1.1).
    pub async fn build(self, manager: M) -> Result<Pool<M>, PoolError<M::Error>> {
        let options = self.into_options()?;
        Pool::construct(manager, options).await
    }
}
