//! Statement-pooling facade over a driver.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use keyed_pool::{KeyedPool, PoolConfig, PoolStats};
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::factory::StatementFactory;
use crate::key::StatementKey;
use crate::statement::PooledStatement;
use crate::StatementDriver;

/// Pools statement handles prepared through a [`StatementDriver`].
///
/// Each prepare entry point builds a [`StatementKey`] from its
/// arguments, borrows a handle for that key (reusing a pooled one when
/// present), and returns it wrapped in a [`PooledStatement`] whose
/// close gives the handle back instead of destroying it.
pub struct PoolingConnection<D: StatementDriver> {
    driver: Arc<D>,
    pool: KeyedPool<StatementFactory<D>>,
    closed: AtomicBool,
}

impl<D: StatementDriver> PoolingConnection<D> {
    /// Create a pooling connection over `driver`.
    ///
    /// # Errors
    /// [`Error::Configuration`] if `config` is invalid.
    pub fn new(driver: D, config: PoolConfig) -> Result<Self, Error> {
        let driver = Arc::new(driver);
        let pool = KeyedPool::new(config, StatementFactory::new(Arc::clone(&driver)))?;
        Ok(Self {
            driver,
            pool,
            closed: AtomicBool::new(false),
        })
    }

    /// Prepare a statement from SQL text alone.
    pub async fn prepare(&self, sql: impl Into<String>) -> Result<PooledStatement<D>, Error> {
        self.prepare_key(StatementKey::prepared(sql)).await
    }

    /// Prepare a statement with an auto-generated-keys mode.
    pub async fn prepare_with_generated_keys(
        &self,
        sql: impl Into<String>,
        mode: i32,
    ) -> Result<PooledStatement<D>, Error> {
        self.prepare_key(StatementKey::prepared_with_generated_keys(sql, mode))
            .await
    }

    /// Prepare a statement with result-set type and concurrency.
    pub async fn prepare_with_result_set(
        &self,
        sql: impl Into<String>,
        result_set_type: i32,
        result_set_concurrency: i32,
    ) -> Result<PooledStatement<D>, Error> {
        self.prepare_key(StatementKey::prepared_with_result_set(
            sql,
            result_set_type,
            result_set_concurrency,
        ))
        .await
    }

    /// Prepare a statement with result-set type, concurrency, and
    /// holdability.
    pub async fn prepare_with_holdability(
        &self,
        sql: impl Into<String>,
        result_set_type: i32,
        result_set_concurrency: i32,
        result_set_holdability: i32,
    ) -> Result<PooledStatement<D>, Error> {
        self.prepare_key(StatementKey::prepared_with_holdability(
            sql,
            result_set_type,
            result_set_concurrency,
            result_set_holdability,
        ))
        .await
    }

    /// Prepare a statement returning generated keys for the given
    /// column indexes.
    pub async fn prepare_with_column_indexes(
        &self,
        sql: impl Into<String>,
        indexes: Vec<i32>,
    ) -> Result<PooledStatement<D>, Error> {
        self.prepare_key(StatementKey::prepared_with_column_indexes(sql, indexes))
            .await
    }

    /// Prepare a statement returning generated keys for the given
    /// column names.
    pub async fn prepare_with_column_names(
        &self,
        sql: impl Into<String>,
        names: Vec<String>,
    ) -> Result<PooledStatement<D>, Error> {
        self.prepare_key(StatementKey::prepared_with_column_names(sql, names))
            .await
    }

    /// Prepare a callable statement from SQL text alone.
    pub async fn prepare_call(&self, sql: impl Into<String>) -> Result<PooledStatement<D>, Error> {
        self.prepare_key(StatementKey::callable(sql)).await
    }

    /// Prepare a callable statement with result-set type and
    /// concurrency.
    pub async fn prepare_call_with_result_set(
        &self,
        sql: impl Into<String>,
        result_set_type: i32,
        result_set_concurrency: i32,
    ) -> Result<PooledStatement<D>, Error> {
        self.prepare_key(StatementKey::callable_with_result_set(
            sql,
            result_set_type,
            result_set_concurrency,
        ))
        .await
    }

    /// Prepare a callable statement with result-set type, concurrency,
    /// and holdability.
    pub async fn prepare_call_with_holdability(
        &self,
        sql: impl Into<String>,
        result_set_type: i32,
        result_set_concurrency: i32,
        result_set_holdability: i32,
    ) -> Result<PooledStatement<D>, Error> {
        self.prepare_key(StatementKey::callable_with_holdability(
            sql,
            result_set_type,
            result_set_concurrency,
            result_set_holdability,
        ))
        .await
    }

    /// Borrow a statement for an explicitly built key.
    ///
    /// The common path behind every prepare overload; public for
    /// callers that construct [`StatementKey`] values directly.
    ///
    /// # Errors
    /// [`Error::IllegalState`] if the connection is closed, plus the
    /// borrow failures described on [`Error`].
    pub async fn prepare_key(&self, key: StatementKey) -> Result<PooledStatement<D>, Error> {
        self.ensure_open()?;
        let raw = self.pool.borrow(&key).await?;
        Ok(PooledStatement::new(self.pool.clone(), key, raw))
    }

    /// Borrow a statement for an explicitly built key, aborting a
    /// blocked wait when `cancel` fires.
    ///
    /// # Errors
    /// As [`prepare_key`](Self::prepare_key), plus [`Error::Cancelled`]
    /// if the token fires while waiting.
    pub async fn prepare_key_with_cancel(
        &self,
        key: StatementKey,
        cancel: &CancellationToken,
    ) -> Result<PooledStatement<D>, Error> {
        self.ensure_open()?;
        let raw = self.pool.borrow_with_cancel(&key, cancel).await?;
        Ok(PooledStatement::new(self.pool.clone(), key, raw))
    }

    /// Close the connection's statement pool.
    ///
    /// Idempotent: the first call destroys every idle handle and marks
    /// the connection closed; later calls are no-ops. Statements still
    /// checked out stay valid; returning them after close destroys
    /// them instead of pooling.
    ///
    /// # Errors
    /// [`Error::Teardown`] if destroying any idle handle failed; every
    /// handle is still attempted.
    pub async fn close(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!("closing statement pool");
        self.pool.close().await?;
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The underlying driver.
    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Idle/active handle counts for the statement pool.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::IllegalState("connection is closed"));
        }
        Ok(())
    }
}

impl<D: StatementDriver> std::fmt::Debug for PoolingConnection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolingConnection")
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}
