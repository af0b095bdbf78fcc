/// The error type returned by [`crate::Pool`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError<E: std::error::Error> {
    /// The pool attempted to hand out a connection but the acquire timeout
    /// elapsed first.
    #[error("timed out waiting for a connection")]
    Timeout,
    /// The pool has been closed and will never hand out another connection.
    #[error("pool is closed")]
    Closed,
    /// A programmer error: a misconfigured pool, or a connection returned to
    /// a pool that didn't produce it.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// `connect` (or `configure`) failed while establishing the pool's
    /// initial connections.
    #[error(transparent)]
    Connect(#[from] E),
}
