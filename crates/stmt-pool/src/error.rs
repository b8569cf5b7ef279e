//! Statement-pool error types.

use keyed_pool::PoolError;
use thiserror::Error;

use crate::driver::DriverError;

/// Errors surfaced to callers of the statement pool.
#[derive(Debug, Error)]
pub enum Error {
    /// Borrow denied under a non-blocking policy, or a blocking wait's
    /// deadline elapsed.
    #[error("statement pool exhausted")]
    PoolExhausted,

    /// Statement preparation failed, or an idle handle turned out to
    /// be unusable.
    #[error("invalid statement handle: {0}")]
    InvalidHandle(#[source] DriverError),

    /// Operation invoked on a closed connection or an
    /// already-returned statement.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// A blocking borrow was aborted by its cancellation token.
    #[error("statement borrow cancelled")]
    Cancelled,

    /// The underlying pool is closed.
    #[error("statement pool is closed")]
    Closed,

    /// Invalid pool configuration.
    #[error("pool configuration error: {0}")]
    Configuration(String),

    /// Destroy failures collected while closing the pool.
    #[error("statement pool teardown destroyed {attempted} handles, {failed} failed: {first}")]
    Teardown {
        /// Number of handles whose destruction was attempted.
        attempted: usize,
        /// Number of destroy calls that failed.
        failed: usize,
        /// The first destroy failure observed.
        #[source]
        first: DriverError,
    },
}

impl From<PoolError> for Error {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::Exhausted => Self::PoolExhausted,
            PoolError::Closed => Self::Closed,
            PoolError::Cancelled => Self::Cancelled,
            PoolError::CreateFailed(source) => Self::InvalidHandle(source),
            PoolError::Teardown {
                attempted,
                failed,
                first,
            } => Self::Teardown {
                attempted,
                failed,
                first,
            },
            PoolError::Configuration(message) => Self::Configuration(message),
        }
    }
}
