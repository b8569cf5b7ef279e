//! # keyed-pool
//!
//! Bounded, concurrent, keyed resource pool.
//!
//! Unlike a flat connection pool, this pool tracks idle and active
//! resources *per key*: each distinct key gets its own idle list and
//! active count, while a global cap bounds the total number of live
//! resources across all keys. Resource creation, validation, and
//! destruction are delegated to a [`KeyedFactory`] supplied at
//! construction.
//!
//! ## Features
//!
//! - Per-key idle and active caps plus a global total cap
//! - Fail-fast or blocking borrow with immediate/bounded/unbounded waits
//! - Cancellation-aware blocking borrow via `CancellationToken`
//! - Idle-handle validation on borrow with destroy-and-retry
//! - Idempotent close with aggregated teardown error reporting
//!
//! ## Example
//!
//! ```rust,ignore
//! use keyed_pool::{KeyedPool, PoolConfig, MaxWait};
//!
//! let config = PoolConfig::new()
//!     .max_idle_per_key(4)
//!     .max_total(64)
//!     .max_wait(MaxWait::Bounded(Duration::from_secs(5)));
//!
//! let pool = KeyedPool::new(config, factory)?;
//! let handle = pool.borrow(&key).await?;
//! // Use handle...
//! pool.give_back(&key, handle).await;
//! ```

pub mod config;
pub mod error;
pub mod factory;
pub mod pool;

pub use config::{MaxWait, PoolConfig};
pub use error::{BoxError, PoolError};
pub use factory::KeyedFactory;
pub use pool::{KeyedPool, PoolStats};
