//! Keyed-pool factory backed by a statement driver.

use std::sync::Arc;

use keyed_pool::{BoxError, KeyedFactory};

use crate::driver::{RawStatement, StatementDriver};
use crate::key::StatementKey;

/// Bridges a [`StatementDriver`] into the pool's factory seam: create
/// delegates to `prepare`, validate to the driver's liveness hook, and
/// destroy to the raw handle's own release.
pub struct StatementFactory<D> {
    driver: Arc<D>,
}

impl<D> StatementFactory<D> {
    /// Wrap a driver for use by the pool.
    pub fn new(driver: Arc<D>) -> Self {
        Self { driver }
    }
}

#[async_trait::async_trait]
impl<D: StatementDriver> KeyedFactory for StatementFactory<D> {
    type Key = StatementKey;
    type Resource = D::Statement;

    async fn create(&self, key: &StatementKey) -> Result<D::Statement, BoxError> {
        tracing::debug!(sql = key.sql(), kind = ?key.kind(), "preparing statement");
        self.driver.prepare(key).await
    }

    async fn validate(&self, _key: &StatementKey, statement: &D::Statement) -> bool {
        self.driver.validate(statement).await
    }

    async fn destroy(&self, key: &StatementKey, mut statement: D::Statement) -> Result<(), BoxError> {
        tracing::debug!(sql = key.sql(), "destroying statement handle");
        statement.destroy().await
    }
}
