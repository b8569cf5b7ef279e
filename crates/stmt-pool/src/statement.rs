//! Pooled statement wrapper.

use keyed_pool::KeyedPool;

use crate::error::Error;
use crate::factory::StatementFactory;
use crate::key::StatementKey;
use crate::StatementDriver;

/// A statement handle borrowed from the pool.
///
/// Wraps the driver's raw handle and intercepts `close`: the first
/// close returns the handle to the pool instead of destroying it, and
/// any later close is a no-op. All other access goes through
/// [`raw`](Self::raw)/[`raw_mut`](Self::raw_mut), which expose the
/// innermost driver handle and fail once the statement has been
/// returned.
///
/// Dropping an unclosed statement returns it to the pool on a spawned
/// task when a tokio runtime is available; prefer calling
/// [`close`](Self::close) explicitly.
pub struct PooledStatement<D: StatementDriver> {
    pool: KeyedPool<StatementFactory<D>>,
    key: StatementKey,
    raw: Option<D::Statement>,
}

impl<D: StatementDriver> PooledStatement<D> {
    pub(crate) fn new(
        pool: KeyedPool<StatementFactory<D>>,
        key: StatementKey,
        raw: D::Statement,
    ) -> Self {
        Self {
            pool,
            key,
            raw: Some(raw),
        }
    }

    /// The key this statement was borrowed under.
    #[must_use]
    pub fn key(&self) -> &StatementKey {
        &self.key
    }

    /// The SQL text this statement was prepared from.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.key.sql()
    }

    /// Access the innermost raw driver handle.
    ///
    /// # Errors
    /// [`Error::IllegalState`] if the statement has been returned.
    pub fn raw(&self) -> Result<&D::Statement, Error> {
        self.raw
            .as_ref()
            .ok_or(Error::IllegalState("statement already returned to pool"))
    }

    /// Mutable access to the innermost raw driver handle.
    ///
    /// # Errors
    /// [`Error::IllegalState`] if the statement has been returned.
    pub fn raw_mut(&mut self) -> Result<&mut D::Statement, Error> {
        self.raw
            .as_mut()
            .ok_or(Error::IllegalState("statement already returned to pool"))
    }

    /// Whether this statement has been returned to the pool.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.raw.is_none()
    }

    /// Return the handle to the pool.
    ///
    /// Idempotent: the first call hands the raw handle back (the pool
    /// may still destroy it if it is closed or the idle cap is met);
    /// subsequent calls do nothing.
    pub async fn close(&mut self) -> Result<(), Error> {
        if let Some(raw) = self.raw.take() {
            tracing::trace!(sql = self.key.sql(), "returning statement to pool");
            self.pool.give_back(&self.key, raw).await;
        }
        Ok(())
    }

    /// Report the handle as broken.
    ///
    /// The handle is destroyed, never pooled, and this statement is
    /// marked returned so a later [`close`](Self::close) is a no-op.
    pub async fn invalidate(&mut self) -> Result<(), Error> {
        if let Some(raw) = self.raw.take() {
            tracing::debug!(sql = self.key.sql(), "invalidating broken statement");
            self.pool.invalidate(&self.key, raw).await;
        }
        Ok(())
    }
}

impl<D: StatementDriver> Drop for PooledStatement<D> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            let pool = self.pool.clone();
            let key = self.key.clone();
            // Best effort: give_back is async, so an implicit return
            // needs a running runtime to land on.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    pool.give_back(&key, raw).await;
                });
            } else {
                tracing::warn!(
                    sql = key.sql(),
                    "dropping unclosed statement outside a runtime; handle not pooled"
                );
            }
        }
    }
}

impl<D: StatementDriver> std::fmt::Debug for PooledStatement<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledStatement")
            .field("sql", &self.key.sql())
            .field("kind", &self.key.kind())
            .field("closed", &self.is_closed())
            .finish()
    }
}
