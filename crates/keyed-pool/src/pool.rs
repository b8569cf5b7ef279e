//! Keyed resource pool implementation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{MaxWait, PoolConfig};
use crate::error::PoolError;
use crate::factory::KeyedFactory;

/// Per-key bookkeeping: idle resources available for reuse plus the
/// number of resources currently borrowed under this key.
struct KeyEntry<T> {
    idle: Vec<T>,
    active: usize,
}

impl<T> Default for KeyEntry<T> {
    fn default() -> Self {
        Self {
            idle: Vec::new(),
            active: 0,
        }
    }
}

/// Combined pool state under a single lock.
struct PoolState<F: KeyedFactory> {
    entries: HashMap<F::Key, KeyEntry<F::Resource>>,
    total_idle: usize,
    total_active: usize,
    closed: bool,
}

struct PoolInner<F: KeyedFactory> {
    config: PoolConfig,
    factory: F,
    state: Mutex<PoolState<F>>,
    /// Waiters blocked in `borrow` park here; every return, invalidate,
    /// rolled-back creation, and close wakes them all, and each waiter
    /// re-checks capacity on wake.
    available: Notify,
}

/// A bounded, concurrent, keyed resource pool.
///
/// Each distinct key gets its own idle list and active count; a global
/// cap bounds live resources across all keys. Cloning the pool is cheap
/// and shares the same underlying state.
pub struct KeyedPool<F: KeyedFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: KeyedFactory> Clone for KeyedPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: KeyedFactory> std::fmt::Debug for KeyedPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("KeyedPool")
            .field("idle", &stats.idle)
            .field("active", &stats.active)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Outcome of a single non-waiting acquisition attempt.
enum Acquire<T> {
    Ready(T),
    Exhausted,
}

impl<F: KeyedFactory> KeyedPool<F> {
    /// Create a new pool over the given factory.
    ///
    /// # Errors
    /// Returns [`PoolError::Configuration`] if the config is invalid.
    pub fn new(config: PoolConfig, factory: F) -> Result<Self, PoolError> {
        config.validate()?;
        tracing::debug!(
            max_idle_per_key = config.max_idle_per_key,
            max_total_per_key = ?config.max_total_per_key,
            max_total = ?config.max_total,
            block_when_exhausted = config.block_when_exhausted,
            "created keyed pool"
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                factory,
                state: Mutex::new(PoolState {
                    entries: HashMap::new(),
                    total_idle: 0,
                    total_active: 0,
                    closed: false,
                }),
                available: Notify::new(),
            }),
        })
    }

    /// Borrow a resource for `key`.
    ///
    /// Reuses an idle resource when one is pooled under the key
    /// (validating it first when `test_on_borrow` is set), creates a
    /// new one when capacity allows (reclaiming an idle slot from
    /// another key when only the global cap is in the way), and
    /// otherwise applies the exhaustion policy: fail fast with
    /// [`PoolError::Exhausted`], or wait for capacity up to `max_wait`.
    ///
    /// # Errors
    /// [`PoolError::Exhausted`] on denied or timed-out requests,
    /// [`PoolError::CreateFailed`] if the factory could not produce a
    /// resource, [`PoolError::Closed`] after [`close`](Self::close).
    pub async fn borrow(&self, key: &F::Key) -> Result<F::Resource, PoolError> {
        let token = CancellationToken::new();
        self.borrow_with_cancel(key, &token).await
    }

    /// Borrow a resource for `key`, aborting a blocked wait when
    /// `cancel` fires.
    ///
    /// # Errors
    /// As [`borrow`](Self::borrow), plus [`PoolError::Cancelled`] if
    /// the token is cancelled while waiting.
    pub async fn borrow_with_cancel(
        &self,
        key: &F::Key,
        cancel: &CancellationToken,
    ) -> Result<F::Resource, PoolError> {
        // Deadline is fixed at entry, monotonic, and shared across all
        // wait iterations.
        let deadline = match (self.inner.config.block_when_exhausted, self.inner.config.max_wait) {
            (true, MaxWait::Bounded(wait)) => Some(Instant::now() + wait),
            _ => None,
        };

        loop {
            // Register interest before re-checking capacity so a wakeup
            // between the check and the await is not lost.
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_acquire(key).await? {
                Acquire::Ready(resource) => return Ok(resource),
                Acquire::Exhausted => {}
            }

            if !self.inner.config.block_when_exhausted
                || self.inner.config.max_wait == MaxWait::Immediate
            {
                tracing::trace!(key = ?key, "borrow denied, pool exhausted");
                return Err(PoolError::Exhausted);
            }

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        () = cancel.cancelled() => return Err(PoolError::Cancelled),
                        timed_out = tokio::time::timeout_at(deadline, notified) => {
                            if timed_out.is_err() {
                                tracing::trace!(key = ?key, "borrow wait deadline elapsed");
                                return Err(PoolError::Exhausted);
                            }
                        }
                    }
                }
                None => {
                    tokio::select! {
                        () = cancel.cancelled() => return Err(PoolError::Cancelled),
                        () = notified => {}
                    }
                }
            }
            // Woken: loop to re-check capacity. Wakeups may be stale or
            // spurious; only the capacity check decides.
        }
    }

    /// One acquisition attempt: idle reuse, then bounded creation.
    /// Never waits; `Acquire::Exhausted` means capacity was denied.
    async fn try_acquire(&self, key: &F::Key) -> Result<Acquire<F::Resource>, PoolError> {
        loop {
            // Fast path: pop the most recently returned idle resource.
            let idle = {
                let mut guard = self.inner.state.lock();
                let state = &mut *guard;
                if state.closed {
                    return Err(PoolError::Closed);
                }
                match state.entries.get_mut(key) {
                    Some(entry) => match entry.idle.pop() {
                        Some(resource) => {
                            state.total_idle -= 1;
                            entry.active += 1;
                            state.total_active += 1;
                            Some(resource)
                        }
                        None => None,
                    },
                    None => None,
                }
            };

            if let Some(resource) = idle {
                if !self.inner.config.test_on_borrow
                    || self.inner.factory.validate(key, &resource).await
                {
                    tracing::trace!(key = ?key, "reusing idle resource");
                    return Ok(Acquire::Ready(resource));
                }
                tracing::debug!(key = ?key, "idle resource failed validation, destroying");
                self.destroy_active(key, resource).await;
                continue;
            }

            // Idle list empty: reserve creation capacity under the lock
            // so concurrent borrows cannot overshoot the limits, then
            // create outside it.
            let (reserved, reclaimed) = {
                let mut guard = self.inner.state.lock();
                let state = &mut *guard;
                if state.closed {
                    return Err(PoolError::Closed);
                }
                let key_active = state.entries.get(key).map_or(0, |entry| entry.active);
                let per_key_ok = self
                    .inner
                    .config
                    .max_total_per_key
                    .is_none_or(|cap| key_active < cap);
                let total_ok = self
                    .inner
                    .config
                    .max_total
                    .is_none_or(|cap| state.total_active + state.total_idle < cap);
                if per_key_ok && total_ok {
                    let entry = state.entries.entry(key.clone()).or_default();
                    entry.active += 1;
                    state.total_active += 1;
                    (true, None)
                } else if per_key_ok && state.total_idle > 0 {
                    // Global cap reached but idle capacity is parked
                    // under some key: reclaim one idle resource and use
                    // its slot for the new creation.
                    match Self::pop_any_idle(state) {
                        Some(victim) => {
                            let entry = state.entries.entry(key.clone()).or_default();
                            entry.active += 1;
                            state.total_active += 1;
                            (true, Some(victim))
                        }
                        None => (false, None),
                    }
                } else {
                    (false, None)
                }
            };

            if let Some((victim_key, victim)) = reclaimed {
                tracing::debug!(
                    victim_key = ?victim_key,
                    key = ?key,
                    "reclaiming idle resource to make room under the global cap"
                );
                if let Err(error) = self.inner.factory.destroy(&victim_key, victim).await {
                    tracing::warn!(key = ?victim_key, error = %error, "failed to destroy reclaimed resource");
                }
            }

            if !reserved {
                return Ok(Acquire::Exhausted);
            }

            match self.inner.factory.create(key).await {
                Ok(resource) => {
                    tracing::debug!(key = ?key, "created pooled resource");
                    return Ok(Acquire::Ready(resource));
                }
                Err(source) => {
                    // Roll back the reservation and hand the freed
                    // capacity to any waiter.
                    self.release_active_slot(key);
                    return Err(PoolError::CreateFailed(source));
                }
            }
        }
    }

    /// Return a borrowed resource to the pool.
    ///
    /// The resource re-enters the key's idle list unless the pool is
    /// closed or the idle cap for the key is already met, in which case
    /// it is destroyed instead. The key's active count is decremented
    /// either way, and waiters are woken.
    pub async fn give_back(&self, key: &F::Key, resource: F::Resource) {
        let evicted = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            match state.entries.get_mut(key) {
                Some(entry) => {
                    entry.active = entry.active.saturating_sub(1);
                    state.total_active = state.total_active.saturating_sub(1);
                    if state.closed || entry.idle.len() >= self.inner.config.max_idle_per_key {
                        if entry.active == 0 && entry.idle.is_empty() {
                            state.entries.remove(key);
                        }
                        Some(resource)
                    } else {
                        entry.idle.push(resource);
                        state.total_idle += 1;
                        None
                    }
                }
                // Return for a key the pool no longer tracks: nothing
                // to account, just release the resource.
                None => Some(resource),
            }
        };
        self.inner.available.notify_waiters();

        match evicted {
            Some(resource) => {
                tracing::debug!(key = ?key, "destroying returned resource (closed or idle cap met)");
                if let Err(error) = self.inner.factory.destroy(key, resource).await {
                    tracing::warn!(key = ?key, error = %error, "failed to destroy evicted resource");
                }
            }
            None => tracing::trace!(key = ?key, "returned resource to idle list"),
        }
    }

    /// Report a borrowed resource as broken.
    ///
    /// The resource is destroyed and never re-enters the idle list; the
    /// key's active count is decremented and waiters are woken.
    pub async fn invalidate(&self, key: &F::Key, resource: F::Resource) {
        tracing::debug!(key = ?key, "invalidating broken resource");
        self.destroy_active(key, resource).await;
    }

    /// Close the pool, destroying every idle resource.
    ///
    /// Idempotent. Subsequent borrows fail fast with
    /// [`PoolError::Closed`]; subsequent returns destroy instead of
    /// pooling. Outstanding borrowed resources stay valid until
    /// returned.
    ///
    /// # Errors
    /// [`PoolError::Teardown`] if any destroy call failed; every idle
    /// resource is still attempted before the error is reported.
    pub async fn close(&self) -> Result<(), PoolError> {
        let drained = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.closed = true;
            state.total_idle = 0;
            let mut drained: Vec<(F::Key, Vec<F::Resource>)> = Vec::new();
            state.entries.retain(|key, entry| {
                if !entry.idle.is_empty() {
                    drained.push((key.clone(), std::mem::take(&mut entry.idle)));
                }
                entry.active > 0
            });
            drained
        };
        // Wake blocked borrowers so they observe the closed flag.
        self.inner.available.notify_waiters();

        let mut attempted = 0usize;
        let mut failed = 0usize;
        let mut first = None;
        for (key, resources) in drained {
            for resource in resources {
                attempted += 1;
                if let Err(error) = self.inner.factory.destroy(&key, resource).await {
                    failed += 1;
                    tracing::warn!(key = ?key, error = %error, "destroy failed during pool teardown");
                    if first.is_none() {
                        first = Some(error);
                    }
                }
            }
        }
        tracing::debug!(attempted, failed, "keyed pool closed");

        match first {
            Some(first) => Err(PoolError::Teardown {
                attempted,
                failed,
                first,
            }),
            None => Ok(()),
        }
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Get current idle/active counts.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            idle: state.total_idle,
            active: state.total_active,
        }
    }

    /// Remove one idle resource from any key, preferring none in
    /// particular. Used to reclaim a slot when the global cap is
    /// reached but idle capacity is parked under other keys.
    fn pop_any_idle(state: &mut PoolState<F>) -> Option<(F::Key, F::Resource)> {
        let victim_key = state
            .entries
            .iter()
            .find(|(_, entry)| !entry.idle.is_empty())
            .map(|(key, _)| key.clone())?;
        let entry = state.entries.get_mut(&victim_key)?;
        let resource = entry.idle.pop()?;
        state.total_idle -= 1;
        if entry.active == 0 && entry.idle.is_empty() {
            state.entries.remove(&victim_key);
        }
        Some((victim_key, resource))
    }

    /// Decrement the key's active count without pooling the resource
    /// slot, waking waiters. Used after a failed creation.
    fn release_active_slot(&self, key: &F::Key) {
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if let Some(entry) = state.entries.get_mut(key) {
                entry.active = entry.active.saturating_sub(1);
                if entry.active == 0 && entry.idle.is_empty() {
                    state.entries.remove(key);
                }
            }
            state.total_active = state.total_active.saturating_sub(1);
        }
        self.inner.available.notify_waiters();
    }

    /// Drop an active resource: release its slot, then destroy it.
    async fn destroy_active(&self, key: &F::Key, resource: F::Resource) {
        self.release_active_slot(key);
        if let Err(error) = self.inner.factory.destroy(key, resource).await {
            tracing::warn!(key = ?key, error = %error, "failed to destroy resource");
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Resources currently held idle across all keys.
    pub idle: usize,
    /// Resources currently borrowed across all keys (including
    /// in-flight creations).
    pub active: usize,
}
