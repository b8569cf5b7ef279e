//! Boundary traits for the underlying database driver.
//!
//! The pool never compiles or executes SQL itself. A driver supplies
//! raw statement handles through [`StatementDriver::prepare`], decoding
//! the options carried by the [`StatementKey`]; the pool only manages
//! handle lifetime.

use crate::key::StatementKey;

/// Error type surfaced by a driver implementation.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A raw statement handle produced by the driver.
///
/// The handle's execute/bind surface is the driver's own inherent API,
/// reached through [`PooledStatement::raw`](crate::PooledStatement::raw);
/// the pool only requires a way to release server-side resources.
#[async_trait::async_trait]
pub trait RawStatement: Send + Sync + 'static {
    /// Release the handle's driver and server resources.
    ///
    /// Called when the pool evicts, invalidates, or tears down the
    /// handle. Must be safe to call once per handle.
    async fn destroy(&mut self) -> Result<(), DriverError>;
}

/// The driver collaborator that performs real statement compilation.
#[async_trait::async_trait]
pub trait StatementDriver: Send + Sync + 'static {
    /// The raw statement handle type this driver produces.
    type Statement: RawStatement;

    /// Compile a statement for the SQL text and execution options in
    /// `key`, returning a fresh raw handle.
    async fn prepare(&self, key: &StatementKey) -> Result<Self::Statement, DriverError>;

    /// Check that a pooled idle handle is still usable.
    ///
    /// Policy hook: a cheap liveness probe, or `true` to trust pooled
    /// handles unconditionally (the default).
    async fn validate(&self, statement: &Self::Statement) -> bool {
        let _ = statement;
        true
    }
}
