//! A thread-safe, self-healing connection pool for asynchronous database
//! connections.
//!
//! Opening a new database connection every time one is needed is both
//! inefficient and can lead to resource exhaustion under high traffic
//! conditions. A pool maintains a set of open connections, handing them out
//! for repeated use and growing, shrinking, and repairing itself in the
//! background.
//!
//! This crate is agnostic to the connection type it manages. Implementors of
//! [`ManageConnection`] provide the database-specific logic to create
//! connections and report their state; [`PoolableConnection`] describes what
//! the pool itself needs from a connection (transaction status, rollback,
//! close).
//!
//! ```no_run
//! # use cistern::{ManageConnection, PoolableConnection, Pool, TransactionStatus};
//! # use async_trait::async_trait;
//! # #[derive(Debug)]
//! # struct MyError;
//! # impl std::fmt::Display for MyError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "error") }
//! # }
//! # impl std::error::Error for MyError {}
//! # struct MyConnection;
//! # #[async_trait]
//! # impl PoolableConnection for MyConnection {
//! #     type Error = MyError;
//! #     fn transaction_status(&self) -> TransactionStatus { TransactionStatus::Idle }
//! #     async fn rollback(&mut self) -> Result<(), MyError> { Ok(()) }
//! #     async fn commit(&mut self) -> Result<(), MyError> { Ok(()) }
//! #     async fn close(self) {}
//! # }
//! # struct MyManager;
//! # #[async_trait]
//! # impl ManageConnection for MyManager {
//! #     type Connection = MyConnection;
//! #     type Error = MyError;
//! #     async fn connect(&self) -> Result<MyConnection, MyError> { Ok(MyConnection) }
//! # }
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Pool::builder().min_conns(4).build(MyManager).await?;
//! let conn = pool.acquire().await?;
//! drop(conn); // returned to the pool automatically
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs, missing_debug_implementations)]

mod builder;
mod error;
mod manager;
mod pool;
mod queue;
mod scheduler;
mod tasks;
mod waiter;

pub use builder::Builder;
pub use error::PoolError;
pub use manager::{
    ConfigureHook, ManageConnection, NopConfigureHook, NopReconnectFailedHook, PoolableConnection,
    ReconnectFailedHook, TransactionStatus,
};
pub use pool::{Pool, PooledConnection, State};
