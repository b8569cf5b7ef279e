//! Pool error types.

use thiserror::Error;

/// Boxed error produced by a [`KeyedFactory`](crate::KeyedFactory)
/// implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Borrow denied: capacity exhausted under a non-blocking policy,
    /// or a blocking wait's deadline elapsed.
    #[error("pool exhausted")]
    Exhausted,

    /// Pool is closed.
    #[error("pool is closed")]
    Closed,

    /// A blocking borrow was aborted by its cancellation token.
    #[error("borrow cancelled")]
    Cancelled,

    /// Resource creation failed.
    #[error("failed to create pooled resource: {0}")]
    CreateFailed(#[source] BoxError),

    /// One or more destroy calls failed during pool teardown.
    ///
    /// Every remaining idle resource is still attempted; the first
    /// failure is reported here after all destructions ran.
    #[error("pool teardown destroyed {attempted} resources, {failed} failed: {first}")]
    Teardown {
        /// Number of resources whose destruction was attempted.
        attempted: usize,
        /// Number of destroy calls that failed.
        failed: usize,
        /// The first destroy failure observed.
        #[source]
        first: BoxError,
    },

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}
