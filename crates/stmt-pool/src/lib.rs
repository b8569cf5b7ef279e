//! # stmt-pool
//!
//! Statement-handle pooling for SQL drivers.
//!
//! Preparing a statement is expensive: the server parses, plans, and
//! registers a handle. This crate sits between application code and a
//! driver, caching prepared (and callable) statement handles keyed by
//! SQL text plus execution options, so repeated preparation of the
//! same statement reuses a live handle instead of recompiling.
//!
//! The public entry point is [`PoolingConnection`], which wraps a
//! [`StatementDriver`] implementation. Borrowed handles come back as
//! [`PooledStatement`] values whose `close` returns the handle to the
//! pool rather than destroying it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use stmt_pool::{PoolingConnection, PoolConfig};
//!
//! let conn = PoolingConnection::new(driver, PoolConfig::default())?;
//!
//! let mut stmt = conn.prepare("select name from users where id = ?").await?;
//! // Execute through the raw handle...
//! stmt.close().await?; // returns the handle to the pool
//!
//! // Same SQL and options: the pooled handle is reused, not re-prepared.
//! let stmt = conn.prepare("select name from users where id = ?").await?;
//! ```

pub mod connection;
pub mod driver;
pub mod error;
pub mod factory;
pub mod key;
pub mod statement;

pub use connection::PoolingConnection;
pub use driver::{DriverError, RawStatement, StatementDriver};
pub use error::Error;
pub use factory::StatementFactory;
pub use key::{StatementKey, StatementKind};
pub use statement::PooledStatement;

// Re-exported so callers can tune the pool without a direct
// keyed-pool dependency.
pub use keyed_pool::{MaxWait, PoolConfig, PoolStats};
